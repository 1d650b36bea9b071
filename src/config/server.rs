// src/config/server.rs
// HTTP server / process configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("HOST", "0.0.0.0"),
            port: super::helpers::env_u32("PORT", 8080) as u16,
            request_timeout_secs: super::helpers::env_usize("REQUEST_TIMEOUT", 30) as u64,
            rate_limit_per_minute: super::helpers::env_u32("RATE_LIMIT_PER_MINUTE", 600),
        }
    }
}
