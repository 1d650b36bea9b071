// src/retrieval/mod.rs
// Knowledge Retriever (§4.B) — hybrid dense + BM25 search over two named
// corpora, with optional LLM query rewrite and LLM rerank. Never raises into
// the caller: any sub-step failure degrades gracefully and the pipeline
// continues with whatever candidates it already has.

pub mod bm25_index;
pub mod dense_index;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::llm::{EmbeddingClient, LlmProvider, Message};
use bm25_index::Bm25Index;
use dense_index::DenseIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    KnowledgeBase,
    ProductCatalog,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::KnowledgeBase => "knowledge_base",
            Collection::ProductCatalog => "product_catalog",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: Value,
}

/// The `{ids, documents, metadatas}` companion store, mirrored to disk as
/// JSON on every mutating op (the original keeps this as a pickled
/// `data.pkl` sidecar next to the FAISS index; this crate persists it as
/// plain JSON instead — see DESIGN.md).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CollectionDocs {
    ids: Vec<String>,
    documents: HashMap<String, String>,
    metadatas: HashMap<String, Value>,
    dim: Option<usize>,
}

impl CollectionDocs {
    fn ordered_pairs(&self) -> Vec<(String, String)> {
        self.ids
            .iter()
            .filter_map(|id| self.documents.get(id).map(|content| (id.clone(), content.clone())))
            .collect()
    }
}

#[derive(Clone)]
struct Candidate {
    id: String,
    content: String,
    metadata: Value,
    score: f32,
}

pub struct KnowledgeRetriever {
    dense: Option<DenseIndex>,
    embeddings: Arc<EmbeddingClient>,
    llm: Arc<dyn LlmProvider>,
    persist_dir: PathBuf,
    bm25: RwLock<HashMap<Collection, Bm25Index>>,
    docs: RwLock<HashMap<Collection, CollectionDocs>>,
}

impl KnowledgeRetriever {
    pub fn new(
        qdrant_url: &str,
        embeddings: Arc<EmbeddingClient>,
        llm: Arc<dyn LlmProvider>,
        persist_dir: impl Into<PathBuf>,
    ) -> Self {
        let dense = match DenseIndex::connect(qdrant_url) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("knowledge retriever: failed to connect to qdrant: {}", e);
                None
            }
        };

        let mut bm25 = HashMap::new();
        let mut docs = HashMap::new();
        for collection in [Collection::KnowledgeBase, Collection::ProductCatalog] {
            bm25.insert(collection, Bm25Index::new());
            docs.insert(collection, CollectionDocs::default());
        }

        let retriever = Self {
            dense,
            embeddings,
            llm,
            persist_dir: persist_dir.into(),
            bm25: RwLock::new(bm25),
            docs: RwLock::new(docs),
        };
        retriever.load_from_disk();
        retriever
    }

    fn sidecar_path(&self, collection: Collection) -> PathBuf {
        self.persist_dir.join(collection.as_str()).join("data.json")
    }

    fn load_from_disk(&self) {
        for collection in [Collection::KnowledgeBase, Collection::ProductCatalog] {
            let path = self.sidecar_path(collection);
            let Ok(bytes) = std::fs::read(&path) else { continue };
            match serde_json::from_slice::<CollectionDocs>(&bytes) {
                Ok(loaded) => {
                    let pairs = loaded.ordered_pairs();
                    self.bm25.write().get_mut(&collection).unwrap().rebuild(&pairs);
                    self.docs.write().insert(collection, loaded);
                }
                Err(e) => warn!("knowledge retriever: failed to parse sidecar {:?}: {}", path, e),
            }
        }
    }

    /// Re-saves the `{ids, documents, metadatas}` sidecar atomically: write
    /// to a temp file then rename, so a crash mid-write never corrupts the
    /// last-known-good copy.
    fn persist(&self, collection: Collection) {
        let snapshot = self.docs.read().get(&collection).cloned().unwrap_or_default();
        let path = self.sidecar_path(collection);
        let Some(dir) = path.parent() else { return };
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("knowledge retriever: failed to create persist dir: {}", e);
            return;
        }
        let tmp_path = path.with_extension("json.tmp");
        let bytes = match serde_json::to_vec(&snapshot) {
            Ok(b) => b,
            Err(e) => {
                warn!("knowledge retriever: failed to serialize sidecar: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&tmp_path, &bytes) {
            warn!("knowledge retriever: failed to write sidecar: {}", e);
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            warn!("knowledge retriever: failed to rename sidecar into place: {}", e);
        }
    }

    fn doc_count(&self, collection: Collection) -> usize {
        self.docs.read().get(&collection).map(|d| d.ids.len()).unwrap_or(0)
    }

    /// Generates up to 3 alternative phrasings via the LLM; on any failure
    /// (including unparsable output) this silently contributes nothing.
    async fn rewrite_query(&self, query: &str) -> Vec<String> {
        let system = "你是一个搜索查询改写助手。给定用户的问题，生成最多3个不同表述的替代查询，\
            每行一个，不要编号，不要多余说明。";
        match self.llm.invoke(vec![Message::user(query)], system).await {
            Ok(response) => response
                .content
                .lines()
                .map(|l| l.trim().trim_start_matches(['-', '*', '·']).trim().to_string())
                .filter(|l| !l.is_empty() && l != query)
                .take(3)
                .collect(),
            Err(e) => {
                warn!("knowledge retriever: query rewrite failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn dense_candidates(
        &self,
        collection: Collection,
        query: &str,
        limit: usize,
        filter_field: Option<(&str, &str)>,
    ) -> Vec<Candidate> {
        let Some(dense) = &self.dense else { return Vec::new() };

        let embedding = match self.embeddings.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("knowledge retriever: embedding failed: {}", e);
                return Vec::new();
            }
        };

        let hits = match dense.search(collection.as_str(), embedding, limit, filter_field).await {
            Ok(h) => h,
            Err(e) => {
                warn!("knowledge retriever: dense search failed: {}", e);
                return Vec::new();
            }
        };

        let docs = self.docs.read();
        let Some(store) = docs.get(&collection) else { return Vec::new() };
        hits.into_iter()
            .filter_map(|hit| {
                let content = store.documents.get(&hit.id)?.clone();
                let metadata = store.metadatas.get(&hit.id).cloned().unwrap_or(Value::Null);
                Some(Candidate { id: hit.id, content, metadata, score: hit.score })
            })
            .collect()
    }

    fn bm25_candidates(&self, collection: Collection, query: &str, limit: usize) -> Vec<Candidate> {
        let bm25 = self.bm25.read();
        let Some(index) = bm25.get(&collection) else { return Vec::new() };
        if index.is_empty() {
            return Vec::new();
        }
        let hits = index.search(query, limit);
        let max_score = hits.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);

        let docs = self.docs.read();
        let Some(store) = docs.get(&collection) else { return Vec::new() };
        hits.into_iter()
            .filter_map(|(id, score)| {
                let content = store.documents.get(&id)?.clone();
                let metadata = store.metadatas.get(&id).cloned().unwrap_or(Value::Null);
                let normalized = if max_score > 0.0 { score / max_score } else { 0.0 };
                Some(Candidate { id, content, metadata, score: normalized })
            })
            .collect()
    }

    /// Presents the shortlist to the LLM and asks for a relevance ordering;
    /// falls back to score order on any parse failure.
    async fn rerank(&self, query: &str, candidates: Vec<Candidate>, top_k: usize) -> (Vec<Candidate>, bool) {
        if candidates.is_empty() {
            return (candidates, false);
        }

        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i, truncate_chars(&c.content, 200)))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "你是一个搜索结果排序助手。根据与查询的相关性，将候选结果从最相关到最不相关排序。\
            只输出候选编号，用逗号分隔，例如：2,0,1";
        let prompt = format!("查询：{query}\n\n候选结果：\n{listing}");

        match self.llm.invoke(vec![Message::user(prompt)], system).await {
            Ok(response) => {
                let indices: Vec<usize> = response
                    .content
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter_map(|tok| tok.trim().parse::<usize>().ok())
                    .filter(|i| *i < candidates.len())
                    .collect();

                if indices.is_empty() {
                    (candidates, false)
                } else {
                    let mut seen = std::collections::HashSet::new();
                    let mut ordered = Vec::new();
                    for i in indices {
                        if seen.insert(i) {
                            ordered.push(candidates[i].clone());
                        }
                        if ordered.len() >= top_k {
                            break;
                        }
                    }
                    if ordered.is_empty() {
                        (candidates, false)
                    } else {
                        (ordered, true)
                    }
                }
            }
            Err(e) => {
                warn!("knowledge retriever: rerank failed: {}", e);
                (candidates, false)
            }
        }
    }

    /// The full hybrid retrieval algorithm (§4.B steps 1-7). Never returns
    /// an error: any internal failure yields fewer (possibly zero) results.
    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve(
        &self,
        query: &str,
        collection: Collection,
        top_k: usize,
        filter_field: Option<(&str, &str)>,
        use_hybrid: bool,
        use_rerank: bool,
        use_query_rewrite: bool,
    ) -> Vec<RetrievedDocument> {
        if self.doc_count(collection) == 0 {
            return Vec::new();
        }

        let mut queries = vec![query.to_string()];
        if use_query_rewrite {
            queries.extend(self.rewrite_query(query).await);
        }

        let candidate_limit = top_k * 2;
        let mut pool: HashMap<String, Candidate> = HashMap::new();

        for q in &queries {
            let dense = self.dense_candidates(collection, q, candidate_limit, filter_field).await;
            let lexical = if use_hybrid {
                self.bm25_candidates(collection, q, candidate_limit)
            } else {
                Vec::new()
            };

            for candidate in dense.into_iter().chain(lexical) {
                let key = truncate_chars(&candidate.content, 100);
                pool.entry(key)
                    .and_modify(|existing| {
                        if candidate.score > existing.score {
                            *existing = candidate.clone();
                        }
                    })
                    .or_insert(candidate);
            }
        }

        let mut ranked: Vec<Candidate> = pool.into_values().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k * 3);

        let (final_set, reranked) = if use_rerank {
            self.rerank(query, ranked, top_k).await
        } else {
            (ranked, false)
        };

        let results: Vec<RetrievedDocument> = final_set
            .into_iter()
            .take(top_k)
            .map(|c| {
                let mut metadata = c.metadata;
                if let Value::Object(map) = &mut metadata {
                    map.insert("retrieval_method".to_string(), Value::String("hybrid".to_string()));
                    map.insert("hybrid_search".to_string(), Value::Bool(use_hybrid));
                    map.insert("reranked".to_string(), Value::Bool(reranked));
                } else {
                    metadata = serde_json::json!({
                        "retrieval_method": "hybrid",
                        "hybrid_search": use_hybrid,
                        "reranked": reranked,
                    });
                }
                RetrievedDocument { content: c.content, metadata }
            })
            .collect();

        crate::metrics::record_retrieval(collection.as_str(), results.len());
        results
    }

    /// Embeds in batches of 10, appends to the dense index, re-saves the
    /// sidecar atomically, and rebuilds BM25 from scratch.
    pub async fn add_documents(&self, collection: Collection, documents: Vec<Document>) -> anyhow::Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embeddings.embed_batch(&texts).await?;

        if let Some(dense) = &self.dense {
            let dim = embeddings.first().map(|v| v.len()).unwrap_or(0);
            if dim > 0 {
                dense.ensure_collection(collection.as_str(), dim).await?;
            }
            for (doc, embedding) in documents.iter().zip(embeddings.iter()) {
                let metadata_json = doc.metadata.to_string();
                dense
                    .upsert(collection.as_str(), &doc.id, embedding.clone(), &doc.content, &metadata_json)
                    .await?;
            }
        }

        {
            let mut docs = self.docs.write();
            let store = docs.entry(collection).or_default();
            for doc in &documents {
                if !store.documents.contains_key(&doc.id) {
                    store.ids.push(doc.id.clone());
                }
                store.documents.insert(doc.id.clone(), doc.content.clone());
                store.metadatas.insert(doc.id.clone(), doc.metadata.clone());
            }
            if let Some(dim) = embeddings.first().map(|v| v.len()) {
                store.dim = Some(dim);
            }
        }

        self.rebuild_bm25(collection);
        self.persist(collection);
        Ok(())
    }

    pub async fn update_document(&self, collection: Collection, document: Document) -> anyhow::Result<()> {
        self.add_documents(collection, vec![document]).await
    }

    /// Removes a document from the dense index (by point id) and the
    /// lexical/metadata store, then rebuilds BM25 from what remains.
    pub async fn delete_document(&self, collection: Collection, id: &str) -> anyhow::Result<()> {
        if let Some(dense) = &self.dense {
            dense.delete(collection.as_str(), id).await?;
        }

        {
            let mut docs = self.docs.write();
            if let Some(store) = docs.get_mut(&collection) {
                store.ids.retain(|existing| existing != id);
                store.documents.remove(id);
                store.metadatas.remove(id);
            }
        }

        self.rebuild_bm25(collection);
        self.persist(collection);
        Ok(())
    }

    fn rebuild_bm25(&self, collection: Collection) {
        let pairs = self.docs.read().get(&collection).map(|d| d.ordered_pairs()).unwrap_or_default();
        self.bm25.write().entry(collection).or_default().rebuild(&pairs);
    }
}

fn truncate_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_llm::MockLlmProvider;

    fn retriever_with_no_dense() -> KnowledgeRetriever {
        // An unreachable qdrant URL still builds a client handle (connect is
        // lazy); dense search calls simply fail and degrade to empty.
        KnowledgeRetriever::new(
            "http://127.0.0.1:1",
            Arc::new(EmbeddingClient::new("http://127.0.0.1:1".to_string(), "k".to_string(), "m".to_string())),
            Arc::new(MockLlmProvider::empty()),
            std::env::temp_dir().join(format!("retrieval-test-{}", uuid::Uuid::new_v4())),
        )
    }

    #[tokio::test]
    async fn empty_collection_short_circuits_with_zero_candidates() {
        let retriever = retriever_with_no_dense();
        let results = retriever
            .retrieve("python", Collection::KnowledgeBase, 5, None, true, false, false)
            .await;
        assert!(results.is_empty());
    }

    #[test]
    fn collection_names_match_spec() {
        assert_eq!(Collection::KnowledgeBase.as_str(), "knowledge_base");
        assert_eq!(Collection::ProductCatalog.as_str(), "product_catalog");
    }

    #[test]
    fn truncate_chars_handles_short_strings() {
        assert_eq!(truncate_chars("hi", 100), "hi");
    }
}
