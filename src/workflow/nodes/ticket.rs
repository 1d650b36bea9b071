// src/workflow/nodes/ticket.rs
// TicketNode (§4.E.5) — extracts a structured ticket {title, description,
// priority, category} from the user's message via the LLM, assigns a
// ticket id, and confirms back to the user.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::llm::{LlmProvider, Message};
use crate::workflow::state::ConversationState;

const SYSTEM_PROMPT: &str = "请从用户消息中提炼一个工单，只输出 JSON，不要任何其他文字，格式为：\
{\"title\": string, \"description\": string, \"priority\": \"low\"|\"medium\"|\"high\"|\"urgent\", \"category\": string}";

#[derive(Debug, Deserialize)]
struct ExtractedTicket {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_priority")]
    priority: String,
    #[serde(default)]
    category: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

pub struct TicketNode {
    llm: Arc<dyn LlmProvider>,
}

impl TicketNode {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let response = match self.llm.invoke(vec![Message::user(state.user_message.clone())], SYSTEM_PROMPT).await {
            Ok(r) => r,
            Err(e) => {
                warn!("ticket: llm extraction failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
                return;
            }
        };

        let extracted = match serde_json::from_str::<ExtractedTicket>(response.content.trim()) {
            Ok(t) => t,
            Err(e) => {
                warn!("ticket: llm output was not valid JSON: {}", e);
                ExtractedTicket {
                    title: state.user_message.chars().take(30).collect(),
                    description: state.user_message.clone(),
                    priority: default_priority(),
                    category: "general".to_string(),
                }
            }
        };

        let ticket_id = format!("TK-{}", Uuid::new_v4().simple());
        state.ticket_id = Some(ticket_id.clone());
        state.response = format!(
            "已为您创建工单 {}（{}，优先级：{}）。我们会尽快处理：{}",
            ticket_id, extracted.category, extracted.priority, extracted.title
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_llm::MockLlmProvider;

    #[tokio::test]
    async fn well_formed_json_produces_ticket_id_and_confirmation() {
        let llm = MockLlmProvider::with_response(
            r#"{"title":"商品破损","description":"收到的商品外壳破损","priority":"high","category":"质量问题"}"#,
        );
        let node = TicketNode::new(Arc::new(llm));
        let mut state = ConversationState::new("u".into(), "s".into(), "我买的东西坏了，要退货".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.ticket_id.is_some());
        assert!(state.response.contains("TK-"));
    }

    #[tokio::test]
    async fn malformed_json_still_produces_a_ticket() {
        let llm = MockLlmProvider::with_response("not json at all");
        let node = TicketNode::new(Arc::new(llm));
        let mut state = ConversationState::new("u".into(), "s".into(), "报错了打不开".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.ticket_id.is_some());
    }
}
