// src/api/http.rs
// `POST /chat/message` (§6) — runs the workflow to completion and returns
// the structured JSON response. Grounded on
// `original_source/backend/api/chat.py`'s `send_message` handler, minus the
// session/DB persistence that belongs to the out-of-scope collaborators
// (§1 Non-goals): this crate's session store already persists the turn via
// SaveContextNode, so there is no separate message-table write here.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::metrics::RequestTimer;
use crate::state::AppState;
use crate::workflow::Attachment;

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub file_path: String,
}

impl From<AttachmentPayload> for Attachment {
    fn from(a: AttachmentPayload) -> Self {
        Attachment {
            file_id: a.file_id,
            file_name: a.file_name,
            file_type: a.file_type,
            file_size: a.file_size,
            file_path: a.file_path,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessageResponse {
    pub message_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<serde_json::Value>,
    pub intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    pub processing_time: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_actions: Vec<crate::workflow::QuickAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommended_products: Vec<String>,
}

/// `POST /chat/message` — runs the graph to completion and returns one JSON
/// response. The request is validated (non-empty session id) before the
/// workflow engine sees it; every other failure mode degrades inside the
/// graph per spec.md §7, so this handler always answers 200 past that point.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Response, AppError> {
    let _timer = RequestTimer::new("chat_message");

    if req.session_id.trim().is_empty() {
        return Err(AppError::validation("session_id must not be empty"));
    }
    if req.message.trim().is_empty() && req.attachments.is_empty() {
        return Err(AppError::validation("message or attachments required"));
    }

    let attachments: Vec<Attachment> = req.attachments.into_iter().map(Attachment::from).collect();

    // user_id is not part of the request body in spec.md §6 — the real
    // deployment resolves it from an auth layer this crate's Non-goals
    // exclude (§1). The session id doubles as the user scope here.
    let user_id = req.session_id.clone();

    let result = tokio::time::timeout(
        super::request_timeout(),
        state.engine.process_message(user_id, req.session_id, req.message, attachments),
    )
    .await;

    let final_state = match result {
        Ok(s) => s,
        Err(_) => {
            warn!("chat_message: request exceeded the global timeout");
            return Ok((
                StatusCode::OK,
                Json(ChatMessageResponse {
                    message_id: uuid::Uuid::new_v4().to_string(),
                    content: crate::error::APOLOGY.to_string(),
                    sources: Vec::new(),
                    intent: "QA".to_string(),
                    ticket_id: None,
                    processing_time: super::request_timeout().as_secs_f64(),
                    quick_actions: Vec::new(),
                    recommended_products: Vec::new(),
                }),
            )
                .into_response());
        }
    };

    Ok((
        StatusCode::OK,
        Json(ChatMessageResponse {
            message_id: uuid::Uuid::new_v4().to_string(),
            content: final_state.response,
            sources: final_state.sources,
            intent: final_state.intent.as_str().to_string(),
            ticket_id: final_state.ticket_id,
            processing_time: final_state.processing_time,
            quick_actions: final_state.quick_actions,
            recommended_products: final_state.recommended_products,
        }),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_payload_converts_fields_verbatim() {
        let payload = AttachmentPayload {
            file_id: "f1".into(),
            file_name: "a.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: 123,
            file_path: "/tmp/a.pdf".into(),
        };
        let attachment: Attachment = payload.into();
        assert_eq!(attachment.file_id, "f1");
        assert_eq!(attachment.file_size, 123);
    }
}
