// src/workflow/nodes/clarify.rs
// ClarifyNode (§4.E.4/§4.E.5) — entered whenever the router decides the
// intent confidence is too low to act on. Asks the LLM for a short,
// friendly re-prompt listing what the assistant can help with, and bypasses
// SaveContextNode entirely (the engine routes this node's output directly
// to the response, not through history persistence).

use std::sync::Arc;

use tracing::warn;

use crate::llm::{LlmProvider, Message};
use crate::workflow::state::ConversationState;

const SYSTEM_PROMPT: &str = "用户的意图不够明确。请用一两句话礼貌地请用户补充说明，\
并列举你能提供的帮助：商品咨询与推荐、订单查询、购买指南、售后工单、文档分析等。";

const FALLBACK: &str = "抱歉，没有完全理解您的意思。我可以帮您查询订单、推荐商品、解答购买问题或提交售后工单，请告诉我您需要哪方面的帮助？";

pub struct ClarifyNode {
    llm: Arc<dyn LlmProvider>,
}

impl ClarifyNode {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        match self.llm.invoke(vec![Message::user(state.user_message.clone())], SYSTEM_PROMPT).await {
            Ok(response) if !response.content.trim().is_empty() => state.response = response.content,
            Ok(_) => state.response = FALLBACK.to_string(),
            Err(e) => {
                warn!("clarify: llm call failed, using fallback: {}", e);
                state.response = FALLBACK.to_string();
            }
        }
        state.sources = Vec::new();
        state.quick_actions = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{Response, TokenUsage, ToolResponse};
    use crate::testing::mock_llm::MockLlmProvider;
    use async_trait::async_trait;
    use std::any::Any;

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn invoke(&self, _messages: Vec<Message>, _system: &str) -> anyhow::Result<Response> {
            anyhow::bail!("provider unavailable")
        }

        async fn invoke_with_tools(
            &self,
            _messages: Vec<Message>,
            _system: &str,
            _tools: Vec<serde_json::Value>,
        ) -> anyhow::Result<ToolResponse> {
            anyhow::bail!("provider unavailable")
        }

        async fn invoke_stream(
            &self,
            _messages: Vec<Message>,
            _system: &str,
        ) -> anyhow::Result<Box<dyn futures::Stream<Item = anyhow::Result<String>> + Send + Unpin>> {
            anyhow::bail!("provider unavailable")
        }
    }

    #[tokio::test]
    async fn llm_response_is_used_when_present() {
        let node = ClarifyNode::new(Arc::new(MockLlmProvider::with_response("您是想查询订单还是咨询商品呢？")));
        let mut state = ConversationState::new("u".into(), "s".into(), "嗯".into(), Vec::new());
        state.confidence = 0.2;
        node.execute(&mut state).await;
        assert!(state.response.contains("订单"));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_static_message() {
        let node = ClarifyNode::new(Arc::new(FailingLlm));
        let mut state = ConversationState::new("u".into(), "s".into(), "？？？".into(), Vec::new());
        node.execute(&mut state).await;
        assert_eq!(state.response, FALLBACK);
    }
}
