// src/workflow/router.rs
// Router (§4.E.4 / §4.F) — pure pattern match from (intent, tool_used,
// confidence) to the next node's key. No LLM calls, no dynamic dispatch
// table; a plain function mirroring the source's route_after_function_calling.

use super::state::{ConversationState, Intent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKey {
    Qa,
    Ticket,
    Document,
    ProductRecommendation,
    ProductInquiry,
    PersonalizedRecommend,
    OrderQuery,
    PurchaseGuide,
    Clarify,
}

impl NodeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKey::Qa => "qa",
            NodeKey::Ticket => "ticket",
            NodeKey::Document => "document",
            NodeKey::ProductRecommendation => "product_recommendation",
            NodeKey::ProductInquiry => "product_inquiry",
            NodeKey::PersonalizedRecommend => "personalized",
            NodeKey::OrderQuery => "order_query",
            NodeKey::PurchaseGuide => "purchase_guide",
            NodeKey::Clarify => "clarify",
        }
    }
}

fn tool_used_contains(tool_used: &Option<String>, name: &str) -> bool {
    tool_used
        .as_deref()
        .map(|joined| joined.split(',').any(|t| t == name))
        .unwrap_or(false)
}

/// Picks the next node after FunctionCallingNode has run. Low confidence
/// always wins to `clarify`, ahead of every other rule, then intent and
/// tool hints are consulted in the order spec.md §4.E.4 lists them.
pub fn route(state: &ConversationState) -> NodeKey {
    if state.confidence < 0.6 {
        return NodeKey::Clarify;
    }

    if state.intent == Intent::ProductRecommend {
        return NodeKey::ProductRecommendation;
    }

    if tool_used_contains(&state.tool_used, "query_order") || tool_used_contains(&state.tool_used, "get_logistics") {
        return NodeKey::OrderQuery;
    }
    if tool_used_contains(&state.tool_used, "search_products") {
        return NodeKey::ProductInquiry;
    }
    if tool_used_contains(&state.tool_used, "check_inventory") || tool_used_contains(&state.tool_used, "calculate_price") {
        return NodeKey::PurchaseGuide;
    }

    match state.intent {
        Intent::Qa => NodeKey::Qa,
        Intent::Ticket => NodeKey::Ticket,
        Intent::DocumentAnalysis => NodeKey::Document,
        Intent::ProductInquiry => NodeKey::ProductInquiry,
        Intent::PurchaseGuide => NodeKey::PurchaseGuide,
        Intent::OrderQuery => NodeKey::OrderQuery,
        Intent::PersonalizedRecommend => NodeKey::PersonalizedRecommend,
        Intent::ProductRecommend => NodeKey::ProductRecommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(intent: Intent, confidence: f32, tool_used: Option<&str>) -> ConversationState {
        let mut state = ConversationState::new("u".into(), "s".into(), "msg".into(), Vec::new());
        state.intent = intent;
        state.confidence = confidence;
        state.tool_used = tool_used.map(String::from);
        state
    }

    #[test]
    fn low_confidence_routes_to_clarify_regardless_of_intent() {
        let state = state_with(Intent::OrderQuery, 0.4, Some("query_order"));
        assert_eq!(route(&state), NodeKey::Clarify);
    }

    #[test]
    fn product_recommend_intent_takes_precedence_over_tool_hints() {
        let state = state_with(Intent::ProductRecommend, 0.9, Some("search_products"));
        assert_eq!(route(&state), NodeKey::ProductRecommendation);
    }

    #[test]
    fn order_tools_route_to_order_query() {
        let state = state_with(Intent::Qa, 0.9, Some("query_order"));
        assert_eq!(route(&state), NodeKey::OrderQuery);
        let state = state_with(Intent::Qa, 0.9, Some("get_logistics"));
        assert_eq!(route(&state), NodeKey::OrderQuery);
    }

    #[test]
    fn search_products_tool_routes_to_product_inquiry() {
        let state = state_with(Intent::Qa, 0.9, Some("search_products"));
        assert_eq!(route(&state), NodeKey::ProductInquiry);
    }

    #[test]
    fn purchase_tools_route_to_purchase_guide() {
        let state = state_with(Intent::Qa, 0.9, Some("check_inventory"));
        assert_eq!(route(&state), NodeKey::PurchaseGuide);
        let state = state_with(Intent::Qa, 0.9, Some("calculate_price"));
        assert_eq!(route(&state), NodeKey::PurchaseGuide);
    }

    #[test]
    fn plain_intent_fallback_mapping() {
        assert_eq!(route(&state_with(Intent::Ticket, 0.9, None)), NodeKey::Ticket);
        assert_eq!(route(&state_with(Intent::DocumentAnalysis, 0.9, None)), NodeKey::Document);
        assert_eq!(route(&state_with(Intent::PersonalizedRecommend, 0.9, None)), NodeKey::PersonalizedRecommend);
    }
}
