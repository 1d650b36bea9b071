// src/config/retrieval.rs
// Knowledge retriever configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub use_hybrid_search: bool,
    pub use_rerank: bool,
    pub use_query_rewrite: bool,
    pub rerank_top_k: usize,
    pub similarity_threshold: f32,
    pub qdrant_url: String,
    pub persist_dir: String,
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        Self {
            top_k: super::helpers::env_usize("RETRIEVAL_TOP_K", 5),
            use_hybrid_search: super::helpers::env_bool("RAG_USE_HYBRID_SEARCH", true),
            use_rerank: super::helpers::env_bool("RAG_USE_RERANK", true),
            use_query_rewrite: super::helpers::env_bool("RAG_USE_QUERY_REWRITE", false),
            rerank_top_k: super::helpers::env_usize("RAG_RERANK_TOP_K", 5),
            similarity_threshold: super::helpers::env_f32("RAG_SIMILARITY_THRESHOLD", 0.5),
            qdrant_url: super::helpers::env_or("QDRANT_URL", "http://localhost:6334"),
            persist_dir: super::helpers::env_or("RETRIEVAL_PERSIST_DIR", "./data/retrieval"),
        }
    }
}
