// src/workflow/nodes/function_calling.rs
// FunctionCallingNode (§4.E.3) — for intents likely to need application
// data, binds the tool catalogue to the LLM and executes whatever calls
// come back. Skips entirely for intents that never need a tool, or when
// confidence is too low to trust the intent at all.

use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::{LlmProvider, Message};
use crate::session::Turn;
use crate::tools::ToolRegistry;
use crate::workflow::state::{ConversationState, Intent, ToolOutcome};

const SKIP_LIST: &[Intent] = &[
    Intent::Qa,
    Intent::DocumentAnalysis,
    Intent::Ticket,
    Intent::PurchaseGuide,
    Intent::PersonalizedRecommend,
];

fn tool_hint_for(intent: Intent) -> &'static str {
    match intent {
        Intent::OrderQuery => "query_order 或 get_logistics",
        Intent::ProductRecommend => "search_products",
        Intent::ProductInquiry => "search_products 或 check_inventory",
        _ => "与用户请求最匹配的工具",
    }
}

pub struct FunctionCallingNode {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
}

impl FunctionCallingNode {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self { llm, tools }
    }

    fn recent_turns_as_messages(history: &[Turn]) -> Vec<Message> {
        let start = history.len().saturating_sub(3);
        history[start..]
            .iter()
            .flat_map(|t| [Message::user(t.user.clone()), Message::assistant(t.assistant.clone())])
            .collect()
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        if SKIP_LIST.contains(&state.intent) || state.confidence < 0.6 {
            state.tool_used = None;
            state.tool_result = None;
            return;
        }

        let system = format!(
            "你在为用户 {} 提供客服支持。当前识别到的意图是 {}，建议调用的工具是：{}。\
             只在确有需要时调用工具，不要编造参数。",
            state.user_id,
            state.intent.as_str(),
            tool_hint_for(state.intent),
        );

        let mut messages = Self::recent_turns_as_messages(&state.conversation_history);
        messages.push(Message::user(format!("[{}] {}", state.intent.as_str(), state.user_message)));

        let response = match self
            .llm
            .invoke_with_tools(messages, &system, self.tools.schemas())
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("function_calling: llm invocation failed: {}", e);
                state.tool_used = None;
                state.tool_result = None;
                return;
            }
        };

        if response.function_calls.is_empty() {
            state.tool_used = None;
            state.tool_result = None;
            return;
        }

        let mut names = Vec::new();
        let mut outcomes = Vec::new();
        for call in response.function_calls {
            info!(tool = %call.name, "function_calling: invoking tool");
            let result = self.tools.call(&call.name, call.arguments).await;
            let succeeded = result.get("success").and_then(|v| v.as_bool()) == Some(true);
            crate::metrics::record_tool_call(&call.name, succeeded);
            names.push(call.name.clone());
            if succeeded {
                outcomes.push(ToolOutcome::Success {
                    tool: call.name,
                    result,
                });
            } else {
                let error = result
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown tool error")
                    .to_string();
                outcomes.push(ToolOutcome::Error { tool: call.name, error });
            }
        }

        state.tool_used = Some(names.join(","));
        state.tool_result = Some(outcomes);
    }
}

/// Finds the success payload of a given tool name in `tool_result`, if any.
pub fn find_success<'a>(tool_result: &'a Option<Vec<ToolOutcome>>, tool_name: &str) -> Option<&'a serde_json::Value> {
    tool_result.as_ref()?.iter().find_map(|outcome| match outcome {
        ToolOutcome::Success { tool, result } if tool == tool_name => Some(result),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::memory::{InMemoryOrderService, InMemoryProductService, InMemoryRecommendationService, InMemoryUserService};
    use crate::llm::provider::FunctionCall;
    use crate::testing::fixtures::{sample_order, sample_products};
    use crate::testing::mock_llm::MockLlmProvider;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new(
            Arc::new(InMemoryOrderService::new(vec![sample_order()])),
            Arc::new(InMemoryProductService::new(sample_products())),
            Arc::new(InMemoryUserService::new(vec![])),
            Arc::new(InMemoryRecommendationService::new(sample_products())),
        ))
    }

    #[tokio::test]
    async fn skip_list_intents_never_call_the_llm() {
        let mut state = ConversationState::new("u".into(), "s".into(), "你好".into(), Vec::new());
        state.intent = Intent::Qa;
        state.confidence = 0.9;
        let node = FunctionCallingNode::new(Arc::new(MockLlmProvider::empty()), registry());
        node.execute(&mut state).await;
        assert!(state.tool_used.is_none());
        assert!(state.tool_result.is_none());
    }

    #[tokio::test]
    async fn low_confidence_skips_tool_call_regardless_of_intent() {
        let mut state = ConversationState::new("u".into(), "s".into(), "订单呢".into(), Vec::new());
        state.intent = Intent::OrderQuery;
        state.confidence = 0.3;
        let node = FunctionCallingNode::new(Arc::new(MockLlmProvider::empty()), registry());
        node.execute(&mut state).await;
        assert!(state.tool_used.is_none());
    }

    #[tokio::test]
    async fn invokes_requested_tool_and_records_success() {
        let mut state = ConversationState::new("u".into(), "s".into(), "我的订单 ORD20240207123456ABCDEF 到哪了".into(), Vec::new());
        state.intent = Intent::OrderQuery;
        state.confidence = 0.9;

        let llm = MockLlmProvider::empty().with_tool_calls(vec![FunctionCall {
            id: "call-1".into(),
            name: "query_order".into(),
            arguments: serde_json::json!({ "order_no": "ORD20240207123456ABCDEF" }),
        }]);
        let node = FunctionCallingNode::new(Arc::new(llm), registry());
        node.execute(&mut state).await;

        assert_eq!(state.tool_used.as_deref(), Some("query_order"));
        assert!(find_success(&state.tool_result, "query_order").is_some());
    }

    #[tokio::test]
    async fn tool_failure_is_recorded_not_panicked() {
        let mut state = ConversationState::new("u".into(), "s".into(), "查一下订单 ORD00000000000000000000".into(), Vec::new());
        state.intent = Intent::OrderQuery;
        state.confidence = 0.9;

        let llm = MockLlmProvider::empty().with_tool_calls(vec![FunctionCall {
            id: "call-1".into(),
            name: "query_order".into(),
            arguments: serde_json::json!({ "order_no": "ORD00000000000000000000" }),
        }]);
        let node = FunctionCallingNode::new(Arc::new(llm), registry());
        node.execute(&mut state).await;

        assert_eq!(state.tool_used.as_deref(), Some("query_order"));
        let outcomes = state.tool_result.unwrap();
        assert!(matches!(&outcomes[0], ToolOutcome::Error { tool, .. } if tool == "query_order"));
    }
}
