// src/workflow/nodes/product_recommendation.rs
// ProductRecommendationNode (§4.E.5) — prefers whatever FunctionCallingNode
// already fetched via search_products; falls back to a direct catalogue
// search (first keyword-looking token from the message, else top-rated)
// when no tool call happened or it failed. Not streamable (spec.md §4.F).

use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::facade::{ProductSearchParams, ProductService};
use crate::llm::{LlmProvider, Message};
use crate::workflow::nodes::function_calling::find_success;
use crate::workflow::state::{ConversationState, QuickAction};

const MAX_CARDS: usize = 5;
const DEFAULT_SENTENCE: &str = "为您挑选了以下几款商品，欢迎挑选。";

const SYSTEM_PROMPT: &str = "请用不超过30个字，为下列推荐商品写一句简短的推荐语，不要提及内部系统或数据来源。";

pub struct ProductRecommendationNode {
    llm: Arc<dyn LlmProvider>,
    products: Arc<dyn ProductService>,
    keyword_re: Regex,
}

impl ProductRecommendationNode {
    pub fn new(llm: Arc<dyn LlmProvider>, products: Arc<dyn ProductService>) -> Self {
        Self {
            llm,
            products,
            keyword_re: Regex::new(r"[\p{Han}A-Za-z0-9]+").unwrap(),
        }
    }

    fn extract_keyword(&self, message: &str) -> Option<String> {
        self.keyword_re.find(message).map(|m| m.as_str().to_string())
    }

    fn product_card(product: &serde_json::Value) -> QuickAction {
        let title = product.get("title").and_then(|v| v.as_str()).unwrap_or("商品").to_string();
        let product_id = product.get("product_id").and_then(|v| v.as_str()).unwrap_or("").to_string();
        QuickAction {
            kind: "product".to_string(),
            label: title.clone(),
            action: "view_product".to_string(),
            data: Some(serde_json::json!({ "product_id": product_id, "title": title, "price": product.get("price") })),
            icon: None,
        }
    }

    fn view_more_action() -> QuickAction {
        QuickAction {
            kind: "button".to_string(),
            label: "查看全部推荐".to_string(),
            action: "view_all_recommendations".to_string(),
            data: None,
            icon: None,
        }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let mut products: Vec<serde_json::Value> = Vec::new();

        if let Some(result) = find_success(&state.tool_result, "search_products") {
            if let Some(arr) = result.get("products").and_then(|v| v.as_array()) {
                products = arr.clone();
            }
        }

        if products.is_empty() {
            let keyword = self.extract_keyword(&state.user_message);
            let by_keyword = ProductSearchParams {
                keyword: keyword.clone(),
                status: Some("published".to_string()),
                sort_by: Some("rating".to_string()),
                order: Some("desc".to_string()),
                page: 1,
                page_size: MAX_CARDS as u32,
                ..Default::default()
            };
            match self.products.search(by_keyword).await {
                Ok(page) if !page.products.is_empty() => {
                    products = page.products.into_iter().map(|p| serde_json::to_value(p).unwrap()).collect()
                }
                Ok(_) if keyword.is_some() => {
                    // Keyword matched nothing: fall back to top-rated overall.
                    let top_rated = ProductSearchParams {
                        status: Some("published".to_string()),
                        sort_by: Some("rating".to_string()),
                        order: Some("desc".to_string()),
                        page: 1,
                        page_size: MAX_CARDS as u32,
                        ..Default::default()
                    };
                    match self.products.search(top_rated).await {
                        Ok(page) => products = page.products.into_iter().map(|p| serde_json::to_value(p).unwrap()).collect(),
                        Err(e) => warn!("product_recommendation: top-rated fallback failed: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("product_recommendation: catalogue search failed: {}", e),
            }
        }

        products.truncate(MAX_CARDS);

        state.recommended_products = products
            .iter()
            .filter_map(|p| p.get("product_id").and_then(|v| v.as_str()).map(String::from))
            .collect();

        if products.is_empty() {
            state.quick_actions = Vec::new();
            state.response = "暂时没有找到匹配的商品，您可以换个关键词试试。".to_string();
            return;
        }

        let mut quick_actions: Vec<QuickAction> = products.iter().map(Self::product_card).collect();
        quick_actions.push(Self::view_more_action());
        state.quick_actions = quick_actions;

        let titles = products
            .iter()
            .filter_map(|p| p.get("title").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("、");

        match self.llm.invoke(vec![Message::user(titles)], SYSTEM_PROMPT).await {
            Ok(response) if !response.content.trim().is_empty() && response.content.chars().count() <= 60 => {
                state.response = response.content
            }
            _ => state.response = DEFAULT_SENTENCE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::memory::InMemoryProductService;
    use crate::testing::fixtures::sample_products;
    use crate::testing::mock_llm::MockLlmProvider;
    use crate::workflow::state::ToolOutcome;

    fn products_service() -> Arc<dyn ProductService> {
        Arc::new(InMemoryProductService::new(sample_products()))
    }

    #[tokio::test]
    async fn prefers_tool_result_products_when_present() {
        let node = ProductRecommendationNode::new(Arc::new(MockLlmProvider::with_response("好评如潮，性价比高。")), products_service());
        let mut state = ConversationState::new("u".into(), "s".into(), "推荐点东西".into(), Vec::new());
        state.tool_result = Some(vec![ToolOutcome::Success {
            tool: "search_products".into(),
            result: serde_json::json!({ "success": true, "products": [{ "product_id": "p-9", "title": "测试商品", "price": 10.0 }], "total": 1 }),
        }]);
        node.execute(&mut state).await;
        assert_eq!(state.recommended_products, vec!["p-9".to_string()]);
        // One product card plus the trailing "view more" button.
        assert_eq!(state.quick_actions.len(), 2);
        assert_eq!(state.quick_actions[0].kind, "product");
        assert_eq!(
            state.quick_actions[0].data.as_ref().and_then(|d| d.get("title")).and_then(|v| v.as_str()),
            Some("测试商品")
        );
        assert_eq!(state.quick_actions[1].kind, "button");
        assert_eq!(state.quick_actions[1].action, "view_all_recommendations");
    }

    #[tokio::test]
    async fn falls_back_to_catalogue_search_without_tool_result() {
        let node = ProductRecommendationNode::new(Arc::new(MockLlmProvider::with_response("强烈推荐这几款。")), products_service());
        let mut state = ConversationState::new("u".into(), "s".into(), "有没有 python 相关的项目".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(!state.quick_actions.is_empty());
        assert!(!state.response.is_empty());
    }

    #[tokio::test]
    async fn no_matches_yields_apology_like_response() {
        let node = ProductRecommendationNode::new(Arc::new(MockLlmProvider::empty()), Arc::new(InMemoryProductService::new(vec![])));
        let mut state = ConversationState::new("u".into(), "s".into(), "推荐个商品".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(state.quick_actions.is_empty());
        assert!(state.response.contains("没有找到"));
    }
}
