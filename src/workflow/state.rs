// src/workflow/state.rs
// ConversationState (§3) — the value threaded through the node graph. Plain
// struct with public fields; nodes take `&mut ConversationState` and return
// nothing, mirroring the source's `state -> state` node contract without
// forcing a clone per hop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{IntentEntry, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Intent {
    #[serde(rename = "QA")]
    Qa,
    Ticket,
    ProductRecommend,
    PersonalizedRecommend,
    ProductInquiry,
    PurchaseGuide,
    OrderQuery,
    DocumentAnalysis,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Qa => "QA",
            Intent::Ticket => "Ticket",
            Intent::ProductRecommend => "ProductRecommend",
            Intent::PersonalizedRecommend => "PersonalizedRecommend",
            Intent::ProductInquiry => "ProductInquiry",
            Intent::PurchaseGuide => "PurchaseGuide",
            Intent::OrderQuery => "OrderQuery",
            Intent::DocumentAnalysis => "DocumentAnalysis",
        }
    }

    /// Substring match of `text` against the closed set, defaulting to QA
    /// when nothing matches — the LLM fallback's post-processing rule.
    pub fn from_loose_text(text: &str) -> Intent {
        const TABLE: &[(&str, Intent)] = &[
            ("DocumentAnalysis", Intent::DocumentAnalysis),
            ("PersonalizedRecommend", Intent::PersonalizedRecommend),
            ("ProductRecommend", Intent::ProductRecommend),
            ("ProductInquiry", Intent::ProductInquiry),
            ("PurchaseGuide", Intent::PurchaseGuide),
            ("OrderQuery", Intent::OrderQuery),
            ("Ticket", Intent::Ticket),
            ("QA", Intent::Qa),
        ];
        for (needle, intent) in TABLE {
            if text.contains(needle) {
                return *intent;
            }
        }
        Intent::Qa
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub file_path: String,
}

/// One tool invocation's outcome, recorded into `tool_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    Success { tool: String, result: Value },
    Error { tool: String, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub content: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuickAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// The value threaded through the node graph for one request. Created fresh
/// at request entry; mutated in place node by node; partially persisted at
/// Save and then discarded.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub user_id: String,
    pub session_id: String,
    pub user_message: String,
    pub attachments: Vec<Attachment>,

    pub conversation_history: Vec<Turn>,
    pub conversation_summary: String,
    pub intent_history: Vec<IntentEntry>,
    pub user_profile: Option<Value>,

    pub intent: Intent,
    pub confidence: f32,

    pub retrieved_docs: Vec<RetrievedDoc>,
    pub tool_used: Option<String>,
    pub tool_result: Option<Vec<ToolOutcome>>,

    pub response: String,
    pub sources: Vec<Value>,
    pub quick_actions: Vec<QuickAction>,
    pub recommended_products: Vec<String>,

    /// Set by TicketNode; carried from the original source's state.py field
    /// of the same name even though spec.md's field list omits it — the
    /// HTTP response shape in spec.md §6 names `ticket_id` explicitly.
    pub ticket_id: Option<String>,

    pub processing_time: f64,
}

impl ConversationState {
    /// Fresh state at request entry: all fields zero/empty except the input
    /// and ids, per spec.md §3's Lifecycle note.
    pub fn new(user_id: String, session_id: String, user_message: String, attachments: Vec<Attachment>) -> Self {
        Self {
            user_id,
            session_id,
            user_message,
            attachments,
            conversation_history: Vec::new(),
            conversation_summary: String::new(),
            intent_history: Vec::new(),
            user_profile: None,
            intent: Intent::Qa,
            confidence: 0.0,
            retrieved_docs: Vec::new(),
            tool_used: None,
            tool_result: None,
            response: String::new(),
            sources: Vec::new(),
            quick_actions: Vec::new(),
            recommended_products: Vec::new(),
            ticket_id: None,
            processing_time: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_text_matches_fall_back_to_qa() {
        assert_eq!(Intent::from_loose_text("nonsense"), Intent::Qa);
        assert_eq!(Intent::from_loose_text("intent: OrderQuery"), Intent::OrderQuery);
    }

    #[test]
    fn loose_text_prefers_longer_names_over_prefixes() {
        // "ProductRecommend" is a substring of nothing else here, but
        // "QA" must not accidentally match inside another label first.
        assert_eq!(Intent::from_loose_text("ProductRecommend"), Intent::ProductRecommend);
    }

    #[test]
    fn fresh_state_has_empty_fields() {
        let state = ConversationState::new("u1".into(), "s1".into(), "hi".into(), Vec::new());
        assert!(state.conversation_history.is_empty());
        assert!(state.tool_used.is_none());
        assert!(state.tool_result.is_none());
        assert_eq!(state.intent, Intent::Qa);
    }
}
