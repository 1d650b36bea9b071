// src/retrieval/bm25_index.rs
// Hand-rolled BM25 lexical index (§4.B). The corpus's `bm25` crate exposes no
// usage this workspace's teacher or its peers actually import, so rather than
// guess at an unfamiliar API under a no-toolchain constraint this scores
// documents with the textbook Okapi BM25 formula directly (see DESIGN.md).
//
// Whitespace-tokenized per the contract — no stemming, no stopword removal.

use std::collections::HashMap;

const K1: f32 = 1.5;
const B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

#[derive(Debug, Clone)]
struct DocEntry {
    id: String,
    term_freqs: HashMap<String, usize>,
    length: usize,
}

/// Rebuilt wholesale on every add/update/delete, per the addition contract.
#[derive(Default)]
pub struct Bm25Index {
    docs: Vec<DocEntry>,
    doc_freq: HashMap<String, usize>,
    avg_doc_length: f32,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Rebuilds the whole index from `(id, content)` pairs in insertion order.
    pub fn rebuild(&mut self, documents: &[(String, String)]) {
        let mut docs = Vec::with_capacity(documents.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0usize;

        for (id, content) in documents {
            let tokens = tokenize(content);
            let mut term_freqs: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            total_length += tokens.len();
            docs.push(DocEntry {
                id: id.clone(),
                term_freqs,
                length: tokens.len(),
            });
        }

        let avg_doc_length = if docs.is_empty() {
            0.0
        } else {
            total_length as f32 / docs.len() as f32
        };

        self.docs = docs;
        self.doc_freq = doc_freq;
        self.avg_doc_length = avg_doc_length;
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Scores every document against `query`, returning `(doc_id, score)`
    /// pairs for documents with a non-zero score, sorted descending, capped
    /// at `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f32)> {
        if self.docs.is_empty() {
            return Vec::new();
        }

        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f32)> = Vec::new();
        for doc in &self.docs {
            let mut score = 0.0f32;
            for term in &query_terms {
                let tf = *doc.term_freqs.get(term).unwrap_or(&0) as f32;
                if tf == 0.0 {
                    continue;
                }
                let idf = self.idf(term);
                let denom = tf + K1 * (1.0 - B + B * (doc.length as f32 / self.avg_doc_length.max(1.0)));
                score += idf * (tf * (K1 + 1.0)) / denom;
            }
            if score > 0.0 {
                scored.push((doc.id.clone(), score));
            }
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<(String, String)> {
        vec![
            ("d1".to_string(), "python data analysis project".to_string()),
            ("d2".to_string(), "vue springboot ecommerce system".to_string()),
            ("d3".to_string(), "python machine learning pipeline".to_string()),
        ]
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = Bm25Index::new();
        assert!(index.search("python", 5).is_empty());
    }

    #[test]
    fn search_ranks_matching_docs_first() {
        let mut index = Bm25Index::new();
        index.rebuild(&sample());
        let results = index.search("python", 5);
        assert!(!results.is_empty());
        assert!(results.iter().any(|(id, _)| id == "d1"));
        assert!(results.iter().any(|(id, _)| id == "d3"));
        assert!(!results.iter().any(|(id, _)| id == "d2"));
    }

    #[test]
    fn rebuild_replaces_prior_contents() {
        let mut index = Bm25Index::new();
        index.rebuild(&sample());
        index.rebuild(&[("only".to_string(), "vue".to_string())]);
        let results = index.search("python", 5);
        assert!(results.is_empty());
    }
}
