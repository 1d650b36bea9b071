// src/api/mod.rs
// HTTP surface (§6): `POST /chat/message`, `POST /chat/stream`, plus the
// ambient health/readiness/metrics probes the teacher always ships
// regardless of product scope.

pub mod http;
pub mod sse;

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/chat/message", post(http::send_message))
        .route("/chat/stream", post(sse::stream_message))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// `/ready` reflects whether the process has finished constructing its
/// dependency graph; since `AppState::new` is synchronous and infallible
/// once it returns, readiness is equivalent to liveness here.
async fn ready() -> impl IntoResponse {
    StatusCode::OK
}

async fn live() -> impl IntoResponse {
    StatusCode::OK
}

/// Applies the server's global per-request deadline (§5, `REQUEST_TIMEOUT`)
/// to the non-streaming flow. Streaming has no hard deadline per spec.md §5.
pub fn request_timeout() -> Duration {
    Duration::from_secs(crate::config::CONFIG.server.request_timeout_secs)
}
