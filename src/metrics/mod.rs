// src/metrics/mod.rs
// Prometheus metrics for the orchestration backend. Grounded on the
// teacher's `backend::metrics::mod.rs`: a single process-wide recorder
// installed at startup, `GET /metrics` renders it, and small free functions
// record the points spec.md §9 calls out (intent decisions, tool
// invocations, retrieval counts, summarization events, LLM errors).

use std::sync::OnceLock;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder. Call once at process start.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let _ = PROMETHEUS_HANDLE.set(handle);
    info!("metrics: Prometheus recorder installed");
}

/// `GET /metrics` — renders the process's accumulated metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

pub fn record_request(endpoint: &str) {
    counter!("chat_requests_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_request_duration(endpoint: &str, seconds: f64) {
    histogram!("chat_request_duration_seconds", "endpoint" => endpoint.to_string()).record(seconds);
}

pub fn record_intent(intent: &str, confidence: f32) {
    counter!("chat_intent_total", "intent" => intent.to_string()).increment(1);
    histogram!("chat_intent_confidence", "intent" => intent.to_string()).record(confidence as f64);
}

pub fn record_tool_call(tool: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("chat_tool_calls_total", "tool" => tool.to_string(), "status" => status).increment(1);
}

pub fn record_retrieval(collection: &str, candidate_count: usize) {
    counter!("chat_retrieval_requests_total", "collection" => collection.to_string()).increment(1);
    histogram!("chat_retrieval_candidates", "collection" => collection.to_string())
        .record(candidate_count as f64);
}

pub fn record_summarization() {
    counter!("chat_summarizations_total").increment(1);
}

pub fn record_llm_error(provider: &str) {
    counter!("chat_llm_errors_total", "provider" => provider.to_string()).increment(1);
}

/// Times a request and records both the count and the duration at drop.
pub struct RequestTimer {
    start: Instant,
    endpoint: String,
}

impl RequestTimer {
    pub fn new(endpoint: &str) -> Self {
        record_request(endpoint);
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.endpoint, self.start.elapsed().as_secs_f64());
    }
}
