// src/workflow/nodes/personalized_recommend.rs
// PersonalizedRecommendNode (§4.E.5) — uses the user's browse history to
// recommend products. With no browse history, nudges the user to browse
// first instead of guessing. The LLM-facing sentence must not mention tech
// stacks or browse history explicitly (spec.md edge case).

use std::sync::Arc;

use tracing::warn;

use crate::facade::{BrowseService, RecommendationService};
use crate::llm::{LlmProvider, Message};
use crate::workflow::state::{ConversationState, QuickAction};

const LIMIT: usize = 5;
const NO_HISTORY_MESSAGE: &str = "还没有看到您的浏览记录，先去逛逛商品，我再根据您的喜好为您推荐吧。";
const DEFAULT_SENTENCE: &str = "根据您的喜好，为您挑选了以下几款。";

const SYSTEM_PROMPT: &str = "请用不超过30个字为下列推荐商品写一句简短的推荐语，\
不要提及任何技术栈名称或用户的浏览记录。";

pub struct PersonalizedRecommendNode {
    llm: Arc<dyn LlmProvider>,
    browse: Arc<dyn BrowseService>,
    recommendations: Arc<dyn RecommendationService>,
}

impl PersonalizedRecommendNode {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        browse: Arc<dyn BrowseService>,
        recommendations: Arc<dyn RecommendationService>,
    ) -> Self {
        Self {
            llm,
            browse,
            recommendations,
        }
    }

    fn product_card(product: &crate::facade::Product) -> QuickAction {
        QuickAction {
            kind: "product_card".to_string(),
            label: product.title.clone(),
            action: "view_product".to_string(),
            data: Some(serde_json::json!({ "product_id": product.product_id, "price": product.price })),
            icon: None,
        }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let interests = match self.browse.get_user_interests(&state.user_id).await {
            Ok(i) => i,
            Err(e) => {
                warn!("personalized_recommend: failed to load interests: {}", e);
                state.response = crate::error::APOLOGY.to_string();
                return;
            }
        };

        if interests.tech_stack.is_empty() && interests.categories.is_empty() {
            state.response = NO_HISTORY_MESSAGE.to_string();
            state.quick_actions = Vec::new();
            return;
        }

        let products = match self.recommendations.get_personalized(&state.user_id, LIMIT, None).await {
            Ok(p) => p,
            Err(e) => {
                warn!("personalized_recommend: recommendation lookup failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
                return;
            }
        };

        if products.is_empty() {
            state.response = NO_HISTORY_MESSAGE.to_string();
            return;
        }

        state.quick_actions = products.iter().map(Self::product_card).collect();
        state.recommended_products = products.iter().map(|p| p.product_id.clone()).collect();

        let titles = products.iter().map(|p| p.title.clone()).collect::<Vec<_>>().join("、");
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
    use crate::facade::memory::{InMemoryBrowseService, InMemoryRecommendationService};
    use crate::testing::fixtures::sample_products;
    use crate::testing::mock_llm::MockLlmProvider;

    #[tokio::test]
    async fn no_browse_history_prompts_user_to_browse_first() {
        let node = PersonalizedRecommendNode::new(
            Arc::new(MockLlmProvider::empty()),
            Arc::new(InMemoryBrowseService::new()),
            Arc::new(InMemoryRecommendationService::new(sample_products())),
        );
        let mut state = ConversationState::new("u1".into(), "s".into(), "有什么适合我的".into(), Vec::new());
        node.execute(&mut state).await;
        assert_eq!(state.response, NO_HISTORY_MESSAGE);
        assert!(state.quick_actions.is_empty());
    }

    #[tokio::test]
    async fn browse_history_drives_personalized_cards() {
        let browse = InMemoryBrowseService::new();
        browse.set_interests("u1", vec![("python", 3)], vec![]);
        let node = PersonalizedRecommendNode::new(
            Arc::new(MockLlmProvider::with_response("这些项目很适合您。")),
            Arc::new(browse),
            Arc::new(InMemoryRecommendationService::new(sample_products())),
        );
        let mut state = ConversationState::new("u1".into(), "s".into(), "有什么适合我的".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(!state.quick_actions.is_empty());
        assert!(!state.response.contains("python"));
    }
}
