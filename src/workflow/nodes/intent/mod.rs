// src/workflow/nodes/intent/mod.rs
// IntentRecognitionNode (§4.E.2) — five-layer classifier: attachment
// shortcut, keyword rules, intent-cache lookup, LLM fallback (two prompt
// variants depending on whether intent history exists), low-confidence
// history fallback. Always appends a new intent_history entry without
// mutating the list it was handed (§8 property 9).

pub mod keyword_tables;

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::cache::IntentCache;
use crate::llm::{LlmProvider, Message};
use crate::session::IntentEntry;
use crate::workflow::state::{ConversationState, Intent};

const SYSTEM_PROMPT: &str = "只输出一个意图标签，不要输出任何其他内容。\n\n\
标签：QA|Ticket|ProductRecommend|ProductInquiry|PurchaseGuide|OrderQuery|PersonalizedRecommend|DocumentAnalysis";

pub struct IntentRecognitionNode {
    llm: Arc<dyn LlmProvider>,
    cache: Arc<IntentCache>,
    history_size: usize,
    fallback_threshold: f32,
}

impl IntentRecognitionNode {
    pub fn new(llm: Arc<dyn LlmProvider>, cache: Arc<IntentCache>, history_size: usize, fallback_threshold: f32) -> Self {
        Self {
            llm,
            cache,
            history_size,
            fallback_threshold,
        }
    }

    fn format_intent_history(&self, intent_history: &[IntentEntry]) -> String {
        if intent_history.is_empty() {
            return "（无历史记录）".to_string();
        }
        let start = intent_history.len().saturating_sub(self.history_size);
        intent_history[start..]
            .iter()
            .map(|e| format!("第{}轮: {} (置信度: {:.1})", e.turn, e.intent, e.confidence))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn find_fallback_intent(&self, intent_history: &[IntentEntry]) -> Option<String> {
        intent_history
            .iter()
            .rev()
            .find(|e| e.confidence >= self.fallback_threshold)
            .map(|e| e.intent.clone())
    }

    fn append_intent_history(&self, state: &mut ConversationState, intent: Intent, confidence: f32) {
        let turn = state.intent_history.last().map(|e| e.turn + 1).unwrap_or(1);
        // Built on a copy of the existing list — never mutates in place by
        // reference the caller may still hold, per §8 property 9.
        let mut updated = state.intent_history.clone();
        updated.push(IntentEntry {
            intent: intent.as_str().to_string(),
            confidence,
            turn,
            timestamp: Utc::now(),
        });
        state.intent_history = updated;
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let message = state.user_message.trim().to_string();

        if !state.attachments.is_empty() && message.chars().count() <= 20 {
            info!("intent: attachment shortcut -> DocumentAnalysis");
            state.intent = Intent::DocumentAnalysis;
            state.confidence = 0.95;
            self.append_intent_history(state, state.intent, state.confidence);
            crate::metrics::record_intent(state.intent.as_str(), state.confidence);
            return;
        }

        if let Some((intent, confidence)) = keyword_tables::classify(&message) {
            info!(intent = intent.as_str(), "intent: keyword rule match");
            state.intent = intent;
            state.confidence = confidence;
            self.append_intent_history(state, state.intent, state.confidence);
            crate::metrics::record_intent(state.intent.as_str(), state.confidence);
            return;
        }

        let cache_key = IntentCache::key_for(&message);
        if let Some(cached) = self.cache.get(&cache_key) {
            info!(intent = %cached.intent, "intent: cache hit");
            state.intent = Intent::from_loose_text(&cached.intent);
            state.confidence = cached.confidence;
            self.append_intent_history(state, state.intent, state.confidence);
            crate::metrics::record_intent(state.intent.as_str(), state.confidence);
            return;
        }

        let truncated: String = message.chars().take(200).collect();
        let system = if state.intent_history.is_empty() {
            SYSTEM_PROMPT.to_string()
        } else {
            format!(
                "{SYSTEM_PROMPT}\n\n最近的意图历史（从旧到新）：\n{}",
                self.format_intent_history(&state.intent_history)
            )
        };

        let (intent, confidence) = match self.llm.invoke(vec![Message::user(truncated)], &system).await {
            Ok(response) => {
                let raw = response.content.trim().trim_matches(['"', '\'', '\u{201c}', '\u{201d}']);
                info!(raw, "intent: llm classification");
                (Intent::from_loose_text(raw), 0.9)
            }
            Err(e) => {
                tracing::warn!("intent: llm classification failed, defaulting to QA: {}", e);
                crate::metrics::record_llm_error(self.llm.name());
                (Intent::Qa, 0.5)
            }
        };

        let mut final_intent = intent;
        if confidence < self.fallback_threshold {
            if let Some(fallback) = self.find_fallback_intent(&state.intent_history) {
                info!(fallback, "intent: low-confidence fallback to history");
                final_intent = Intent::from_loose_text(&fallback);
            }
        }

        state.intent = final_intent;
        state.confidence = confidence;
        self.cache.put(cache_key, intent.as_str().to_string(), confidence);
        self.append_intent_history(state, state.intent, state.confidence);
        crate::metrics::record_intent(state.intent.as_str(), state.confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_llm::MockLlmProvider;

    fn node(llm: MockLlmProvider) -> IntentRecognitionNode {
        IntentRecognitionNode::new(Arc::new(llm), Arc::new(IntentCache::new(100)), 5, 0.6)
    }

    #[tokio::test]
    async fn attachment_shortcut_skips_llm_call() {
        let mut state = ConversationState::new("u".into(), "s".into(), "看看这个".into(), Vec::new());
        state.attachments.push(crate::workflow::state::Attachment {
            file_id: "f1".into(),
            file_name: "a.txt".into(),
            file_type: "text/plain".into(),
            file_size: 10,
            file_path: "/tmp/a.txt".into(),
        });
        let node = node(MockLlmProvider::empty());
        node.execute(&mut state).await;
        assert_eq!(state.intent, Intent::DocumentAnalysis);
        assert!(state.confidence >= 0.95);
        assert_eq!(state.intent_history.len(), 1);
        assert_eq!(state.intent_history[0].turn, 1);
    }

    #[tokio::test]
    async fn keyword_rule_matches_without_llm_call() {
        let mut state = ConversationState::new("u".into(), "s".into(), "我的订单到哪了".into(), Vec::new());
        let node = node(MockLlmProvider::empty());
        node.execute(&mut state).await;
        assert_eq!(state.intent, Intent::OrderQuery);
        assert!(state.confidence >= 0.88);
    }

    #[tokio::test]
    async fn llm_fallback_classifies_greeting_as_qa() {
        let mut state = ConversationState::new("u".into(), "s".into(), "你好".into(), Vec::new());
        let node = node(MockLlmProvider::with_response("QA"));
        node.execute(&mut state).await;
        assert_eq!(state.intent, Intent::Qa);
        assert!(state.confidence >= 0.75);
    }

    #[tokio::test]
    async fn append_intent_history_does_not_mutate_passed_in_list() {
        let mut state = ConversationState::new("u".into(), "s".into(), "你好".into(), Vec::new());
        state.intent_history.push(IntentEntry {
            intent: "QA".into(),
            confidence: 0.9,
            turn: 1,
            timestamp: Utc::now(),
        });
        let original_len = state.intent_history.len();
        let snapshot = state.intent_history.clone();

        let node = node(MockLlmProvider::with_response("QA"));
        node.execute(&mut state).await;

        assert_eq!(snapshot.len(), original_len);
        assert_eq!(state.intent_history.len(), original_len + 1);
        assert_eq!(state.intent_history[1].turn, 2);
    }

    #[tokio::test]
    async fn llm_error_degrades_to_qa_with_half_confidence() {
        struct FailingLlm;
        #[async_trait::async_trait]
        impl LlmProvider for FailingLlm {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            async fn invoke(&self, _messages: Vec<Message>, _system: &str) -> anyhow::Result<crate::llm::Response> {
                Err(anyhow::anyhow!("upstream down"))
            }
            async fn invoke_with_tools(
                &self,
                _messages: Vec<Message>,
                _system: &str,
                _tools: Vec<serde_json::Value>,
            ) -> anyhow::Result<crate::llm::ToolResponse> {
                unreachable!()
            }
        }

        let mut state = ConversationState::new("u".into(), "s".into(), "随便说点什么".into(), Vec::new());
        let node = IntentRecognitionNode::new(Arc::new(FailingLlm), Arc::new(IntentCache::new(100)), 5, 0.6);
        node.execute(&mut state).await;
        assert_eq!(state.intent, Intent::Qa);
        assert_eq!(state.confidence, 0.5);
    }
}
