// src/error.rs
// Error taxonomy for the orchestration engine.
//
// Every kind here maps to a degrade-gracefully policy described in the
// workflow nodes; only ValidationError is meant to surface as an HTTP
// error. The rest are caught and converted into apology text or empty
// results by the node that produced them — see workflow::nodes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub const APOLOGY: &str = "处理您的请求时出现了问题，请稍后再试";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("upstream LLM error: {0}")]
    UpstreamLlm(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("tool execution error: {0}")]
    ToolExecution(String),

    #[error("summarization error: {0}")]
    Summarization(String),

    #[error("io error: {0}")]
    Io(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            // None of the other kinds are meant to reach the HTTP boundary —
            // every node degrades internally — but if one escapes anyway,
            // answer with the same apology text rather than a stack trace.
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
