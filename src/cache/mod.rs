// src/cache/mod.rs
// Intent Cache (§4.E.2, §5) — a process-wide keyed cache mapping the MD5 of
// a normalized user message to the intent/confidence the LLM fallback most
// recently produced for it. Coarse-locked, short-lived entries; an LRU-ish
// eviction discards the oldest half once size hits `max_size` (default 1000,
// per §5) rather than tracking per-entry recency, matching the source's
// batch-eviction strategy.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedIntent {
    pub intent: String,
    pub confidence: f32,
}

struct Inner {
    entries: HashMap<String, CachedIntent>,
    insertion_order: Vec<String>,
}

pub struct IntentCache {
    inner: Arc<RwLock<Inner>>,
    max_size: usize,
}

impl IntentCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: HashMap::new(),
                insertion_order: Vec::new(),
            })),
            max_size,
        }
    }

    /// MD5 of the lowercased, trimmed message — matches the source's cache key.
    pub fn key_for(message: &str) -> String {
        format!("{:x}", md5::compute(message.trim().to_lowercase()))
    }

    pub fn get(&self, key: &str) -> Option<CachedIntent> {
        self.inner.read().entries.get(key).cloned()
    }

    pub fn put(&self, key: String, intent: String, confidence: f32) {
        let mut inner = self.inner.write();

        if inner.entries.len() >= self.max_size && !inner.entries.contains_key(&key) {
            let evict_count = self.max_size / 2;
            for old_key in inner.insertion_order.drain(..evict_count.min(inner.insertion_order.len())) {
                inner.entries.remove(&old_key);
            }
        }

        if !inner.entries.contains_key(&key) {
            inner.insertion_order.push(key.clone());
        }
        inner.entries.insert(key, CachedIntent { intent, confidence });
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IntentCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_case_and_whitespace_insensitive() {
        assert_eq!(IntentCache::key_for("  Hello World  "), IntentCache::key_for("hello world"));
    }

    #[test]
    fn get_missing_is_none() {
        let cache = IntentCache::new(10);
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn put_then_get_roundtrips() {
        let cache = IntentCache::new(10);
        let key = IntentCache::key_for("你好");
        cache.put(key.clone(), "QA".to_string(), 0.9);
        let cached = cache.get(&key).unwrap();
        assert_eq!(cached.intent, "QA");
        assert_eq!(cached.confidence, 0.9);
    }

    #[test]
    fn eviction_discards_oldest_half_at_capacity() {
        let cache = IntentCache::new(4);
        for i in 0..4 {
            cache.put(format!("k{i}"), "QA".to_string(), 0.9);
        }
        assert_eq!(cache.len(), 4);
        // Inserting a 5th distinct key triggers eviction of the oldest 2.
        cache.put("k4".to_string(), "QA".to_string(), 0.9);
        assert!(cache.len() <= 4);
        assert!(cache.get("k0").is_none());
        assert!(cache.get("k4").is_some());
    }
}
