// src/workflow/nodes/product_inquiry.rs
// ProductInquiryNode (§4.E.5) — deeper comparison/recommendation than
// ProductRecommendationNode: asks the LLM to weigh 3-5 candidate products
// against the user's specific question. Not streamable (spec.md §4.F).

use std::sync::Arc;

use tracing::warn;

use crate::facade::{ProductSearchParams, ProductService};
use crate::llm::{LlmProvider, Message};
use crate::workflow::nodes::function_calling::find_success;
use crate::workflow::state::{ConversationState, QuickAction};

const MIN_CANDIDATES: usize = 3;
const MAX_CANDIDATES: usize = 5;

const SYSTEM_PROMPT: &str = "你是电商平台的选购顾问。请结合用户的问题，对比下列候选商品的特点，\
给出详细的选购建议，并指出你认为最适合用户的 1-2 款。只依据提供的商品信息作答。";

pub struct ProductInquiryNode {
    llm: Arc<dyn LlmProvider>,
    products: Arc<dyn ProductService>,
}

impl ProductInquiryNode {
    pub fn new(llm: Arc<dyn LlmProvider>, products: Arc<dyn ProductService>) -> Self {
        Self { llm, products }
    }

    fn product_card(product: &serde_json::Value) -> QuickAction {
        let title = product.get("title").and_then(|v| v.as_str()).unwrap_or("商品").to_string();
        let product_id = product.get("product_id").and_then(|v| v.as_str()).unwrap_or("").to_string();
        QuickAction {
            kind: "product_card".to_string(),
            label: title,
            action: "view_product".to_string(),
            data: Some(serde_json::json!({ "product_id": product_id, "price": product.get("price") })),
            icon: None,
        }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let mut candidates: Vec<serde_json::Value> = Vec::new();

        if let Some(result) = find_success(&state.tool_result, "search_products") {
            if let Some(arr) = result.get("products").and_then(|v| v.as_array()) {
                candidates = arr.clone();
            }
        }

        if candidates.len() < MIN_CANDIDATES {
            let params = ProductSearchParams {
                status: Some("published".to_string()),
                sort_by: Some("rating".to_string()),
                order: Some("desc".to_string()),
                page: 1,
                page_size: MAX_CANDIDATES as u32,
                ..Default::default()
            };
            match self.products.search(params).await {
                Ok(page) => candidates = page.products.into_iter().map(|p| serde_json::to_value(p).unwrap()).collect(),
                Err(e) => warn!("product_inquiry: catalogue search failed: {}", e),
            }
        }

        candidates.truncate(MAX_CANDIDATES);

        if candidates.is_empty() {
            state.response = "暂时没有找到可以比较的商品，能再描述一下您的需求吗？".to_string();
            return;
        }

        let catalogue = candidates
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "[{}] {} - 价格 {} - 技术栈 {} - 评分 {}",
                    i + 1,
                    p.get("title").and_then(|v| v.as_str()).unwrap_or(""),
                    p.get("price").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    p.get("tech_stack").map(|v| v.to_string()).unwrap_or_default(),
                    p.get("rating").and_then(|v| v.as_f64()).unwrap_or(0.0),
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!("{SYSTEM_PROMPT}\n\n候选商品:\n{catalogue}");

        match self.llm.invoke(vec![Message::user(state.user_message.clone())], &system).await {
            Ok(response) => state.response = response.content,
            Err(e) => {
                warn!("product_inquiry: llm call failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
            }
        }

        state.recommended_products = candidates
            .iter()
            .filter(|p| {
                let title = p.get("title").and_then(|v| v.as_str()).unwrap_or("");
                let id = p.get("product_id").and_then(|v| v.as_str()).unwrap_or("");
                !id.is_empty() && (state.response.contains(title) || state.response.contains(id))
            })
            .filter_map(|p| p.get("product_id").and_then(|v| v.as_str()).map(String::from))
            .collect();

        state.quick_actions = candidates.iter().map(Self::product_card).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::memory::InMemoryProductService;
    use crate::testing::fixtures::sample_products;
    use crate::testing::mock_llm::MockLlmProvider;

    fn products_service() -> Arc<dyn ProductService> {
        Arc::new(InMemoryProductService::new(sample_products()))
    }

    #[tokio::test]
    async fn compares_catalogue_products_when_no_tool_result() {
        let node = ProductInquiryNode::new(
            Arc::new(MockLlmProvider::with_response("推荐 Python 数据分析毕业设计，性价比更高。")),
            products_service(),
        );
        let mut state = ConversationState::new("u".into(), "s".into(), "这两个项目哪个更适合新手".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(!state.response.is_empty());
        assert!(!state.quick_actions.is_empty());
        assert!(state.recommended_products.contains(&"p-1".to_string()));
    }

    #[tokio::test]
    async fn empty_catalogue_yields_a_follow_up_question() {
        let node = ProductInquiryNode::new(Arc::new(MockLlmProvider::empty()), Arc::new(InMemoryProductService::new(vec![])));
        let mut state = ConversationState::new("u".into(), "s".into(), "帮我选一个".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.response.contains("没有找到"));
    }
}
