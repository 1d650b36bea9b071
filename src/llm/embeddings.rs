// src/llm/embeddings.rs
// Thin client over an openai-compatible embeddings endpoint, used by the
// knowledge retriever to embed both corpus documents and queries (§4.B).
// Documents are embedded in batches of 10 per the addition contract.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const BATCH_SIZE: usize = 10;

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| anyhow!("embedding service returned no vectors"))
    }

    /// Embeds texts in batches of 10, preserving input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = EmbeddingRequest {
                model: self.model.clone(),
                input: chunk.to_vec(),
            };

            let response = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("embedding service returned {}: {}", status, body));
            }

            let parsed: EmbeddingResponse = response.json().await?;
            out.extend(parsed.data.into_iter().map(|d| d.embedding));
        }

        Ok(out)
    }
}
