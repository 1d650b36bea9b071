// src/config/mod.rs
// Central configuration for the customer-service orchestration backend.

pub mod helpers;
pub mod llm;
pub mod memory;
pub mod retrieval;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::from_env();
}

/// Composes all domain configs loaded once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: llm::LlmConfig,
    pub retrieval: retrieval::RetrievalConfig,
    pub memory: memory::MemoryConfig,
    pub server: server::ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        Self {
            llm: llm::LlmConfig::from_env(),
            retrieval: retrieval::RetrievalConfig::from_env(),
            memory: memory::MemoryConfig::from_env(),
            server: server::ServerConfig::from_env(),
        }
    }
}
