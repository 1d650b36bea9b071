// src/config/memory.rs
// Session memory / summarization configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub intent_history_size: usize,
    pub intent_fallback_threshold: f32,
    pub summary_trigger_threshold: usize,
    pub context_max_tokens: usize,
    pub context_max_history: usize,
    pub max_concurrent_sessions: usize,
    pub intent_cache_max_size: usize,
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        Self {
            intent_history_size: super::helpers::env_usize("INTENT_HISTORY_SIZE", 5),
            intent_fallback_threshold: super::helpers::env_f32("INTENT_FALLBACK_THRESHOLD", 0.6),
            summary_trigger_threshold: super::helpers::env_usize("SUMMARY_TRIGGER_THRESHOLD", 10),
            context_max_tokens: super::helpers::env_usize("CONTEXT_MAX_TOKENS", 3000),
            context_max_history: super::helpers::env_usize("CONTEXT_MAX_HISTORY", 20),
            max_concurrent_sessions: super::helpers::env_usize("MAX_CONCURRENT_SESSIONS", 1000),
            intent_cache_max_size: super::helpers::env_usize("INTENT_CACHE_MAX_SIZE", 1000),
        }
    }
}
