// src/workflow/nodes/purchase_guide.rs
// PurchaseGuideNode (§4.E.5) — answers questions about the purchase flow,
// payment methods, and refund policy against a static knowledge prompt.
// Streamable (spec.md §4.F), unlike the other non-QA responders.

use std::sync::Arc;

use tracing::warn;

use crate::llm::{LlmProvider, Message};
use crate::workflow::state::ConversationState;

const SYSTEM_PROMPT: &str = "你是电商平台的购物顾问，请根据以下平台政策回答用户的问题：\n\
- 购买流程：浏览商品 → 加入购物车或直接下单 → 选择支付方式 → 支付成功后可在订单页查看交付进度。\n\
- 支付方式：支持微信支付、支付宝与银行卡支付。\n\
- 退款政策：订单完成前可随时取消并全额退款；完成后 7 天内可申请售后，经审核后退款。\n\
只基于以上政策作答，不要编造额外规则。";

pub struct PurchaseGuideNode {
    llm: Arc<dyn LlmProvider>,
}

impl PurchaseGuideNode {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        match self.llm.invoke(vec![Message::user(state.user_message.clone())], SYSTEM_PROMPT).await {
            Ok(response) => state.response = response.content,
            Err(e) => {
                warn!("purchase_guide: llm call failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
            }
        }
        state.sources = Vec::new();
    }

    /// Streaming variant for process_message_stream: same static policy
    /// prompt, but forwards token deltas as they arrive.
    pub async fn stream(
        &self,
        state: &ConversationState,
    ) -> anyhow::Result<Box<dyn futures::Stream<Item = anyhow::Result<String>> + Send + Unpin>> {
        self.llm
            .invoke_stream(vec![Message::user(state.user_message.clone())], SYSTEM_PROMPT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_llm::MockLlmProvider;

    #[tokio::test]
    async fn answers_against_the_static_policy_prompt() {
        let node = PurchaseGuideNode::new(Arc::new(MockLlmProvider::with_response("支持微信、支付宝和银行卡支付。")));
        let mut state = ConversationState::new("u".into(), "s".into(), "你们支持什么支付方式".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.response.contains("支付"));
    }
}
