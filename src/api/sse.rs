// src/api/sse.rs
// Streaming Transport (§4.I) — `POST /chat/stream` manually controls the
// response headers and per-event flush rather than using axum's `Sse`
// wrapper, because spec.md §4.I names exact header values (including
// `X-Accel-Buffering: no`, which `axum::response::sse::Sse` does not set)
// and an explicit empty terminating chunk. Grounded on the teacher's
// `proxy::routes::proxy_messages` streaming branch, which builds a raw
// `Response` over `Body::from_stream` with manual SSE headers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::api::http::ChatMessageRequest;
use crate::error::AppError;
use crate::metrics::RequestTimer;
use crate::state::AppState;
use crate::workflow::{Attachment, StreamEvent};

fn frame(event: &StreamEvent) -> Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("data: {payload}\n\n"))
}

/// `POST /chat/stream` — emits the event sequence spec.md §4.G and §8
/// property 6 describe: one `start`, one `intent`, zero-or-more `thinking`,
/// one-or-more `content`, exactly one `end`.
pub async fn stream_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Response, AppError> {
    let _timer = RequestTimer::new("chat_stream");

    if req.session_id.trim().is_empty() {
        return Err(AppError::validation("session_id must not be empty"));
    }
    if req.message.trim().is_empty() && req.attachments.is_empty() {
        return Err(AppError::validation("message or attachments required"));
    }

    let attachments: Vec<Attachment> = req.attachments.into_iter().map(Attachment::from).collect();
    let user_id = req.session_id.clone();

    let events = state
        .engine
        .clone()
        .process_message_stream(user_id, req.session_id, req.message, attachments);

    let body_stream = events.map(|event| Ok::<Bytes, std::io::Error>(frame(&event))).chain(
        // The spec's transport terminates with an explicit empty chunk
        // rather than relying on the framework to close the connection.
        futures::stream::once(async { Ok::<Bytes, std::io::Error>(Bytes::new()) }),
    );

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Io(e.to_string()))?;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));

    Ok(response)
}
