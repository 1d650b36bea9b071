// src/config/llm.rs
// LLM provider configuration: one "main" provider slot and one faster/cheaper
// "intent" provider slot, both pointed at an openai-compatible chat completions
// endpoint as selected by LLM_PROVIDER.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub main: ProviderConfig,
    pub intent: ProviderConfig,
    pub temperature: f64,
    pub max_tokens: i64,
    pub embedding_base_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let provider = super::helpers::env_or("LLM_PROVIDER", "openai-compatible");

        let main = ProviderConfig {
            provider: provider.clone(),
            base_url: super::helpers::env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
            api_key: super::helpers::env_or("LLM_API_KEY", ""),
            model: super::helpers::env_or("LLM_MODEL", "gpt-4o-mini"),
        };

        let intent = ProviderConfig {
            provider,
            base_url: super::helpers::env_or("LLM_INTENT_BASE_URL", &main.base_url),
            api_key: super::helpers::env_or("LLM_INTENT_API_KEY", &main.api_key),
            model: super::helpers::env_or("LLM_INTENT_MODEL", "gpt-4o-mini"),
        };

        Self {
            main,
            intent,
            temperature: super::helpers::env_f64("LLM_TEMPERATURE", 0.7),
            max_tokens: super::helpers::env_usize("LLM_MAX_TOKENS", 1024) as i64,
            embedding_base_url: super::helpers::env_or(
                "EMBEDDING_BASE_URL",
                "https://api.openai.com/v1",
            ),
            embedding_api_key: super::helpers::env_or("EMBEDDING_API_KEY", ""),
            embedding_model: super::helpers::env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
        }
    }
}
