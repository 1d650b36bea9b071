// src/workflow/nodes/save_context.rs
// SaveContextNode (§4.E.6) — the final node on every path except Clarify.
// Appends the turn, updates intent history, and triggers summarization
// once the session's history crosses the configured threshold.

use std::sync::Arc;

use tracing::warn;

use crate::session::{SessionStore, SessionUpdate};
use crate::summarizer::ConversationSummarizer;
use crate::workflow::state::ConversationState;

pub struct SaveContextNode {
    store: Arc<SessionStore>,
    summarizer: Arc<ConversationSummarizer>,
}

impl SaveContextNode {
    pub fn new(store: Arc<SessionStore>, summarizer: Arc<ConversationSummarizer>) -> Self {
        Self { store, summarizer }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        self.store.append_turn(&state.session_id, state.user_message.clone(), state.response.clone());

        // IntentRecognitionNode already appended this turn's entry to
        // `state.intent_history` (§4.E.2 step 6); this just persists it.
        self.store.update(
            &state.session_id,
            SessionUpdate {
                last_intent: Some(state.intent.as_str().to_string()),
                intent_history: Some(state.intent_history.clone()),
                ..Default::default()
            },
        );

        let Some(record) = self.store.get(&state.session_id) else {
            return;
        };

        if !self.summarizer.should_summarize(&record.history) {
            return;
        }

        match self.summarizer.summarize(&record.history, &record.conversation_summary).await {
            Ok(result) => {
                self.store.update(
                    &state.session_id,
                    SessionUpdate {
                        history: Some(result.remaining_history.clone()),
                        conversation_summary: Some(result.summary.clone()),
                        ..Default::default()
                    },
                );
                state.conversation_history = result.remaining_history;
                state.conversation_summary = result.summary;
            }
            Err(e) => {
                warn!("save_context: summarization failed, falling back to truncation: {}", e);
                let result = self.summarizer.fallback_truncate(&record.history);
                self.store.update(
                    &state.session_id,
                    SessionUpdate {
                        history: Some(result.remaining_history.clone()),
                        ..Default::default()
                    },
                );
                state.conversation_history = result.remaining_history;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::IntentEntry;
    use crate::testing::mock_llm::MockLlmProvider;
    use crate::workflow::state::Intent;

    fn new_node(trigger: usize) -> SaveContextNode {
        let store = Arc::new(SessionStore::new());
        let summarizer = Arc::new(ConversationSummarizer::new(Arc::new(MockLlmProvider::with_response("摘要内容")), trigger, 3000));
        SaveContextNode::new(store, summarizer)
    }

    #[tokio::test]
    async fn appends_turn_and_records_intent() {
        let node = new_node(10);
        let mut state = ConversationState::new("u".into(), "s1".into(), "你好".into(), Vec::new());
        state.intent = Intent::Qa;
        state.confidence = 0.95;
        state.response = "您好，有什么可以帮您？".to_string();
        // Simulates the entry IntentRecognitionNode would already have
        // appended before SaveContextNode ever runs.
        state.intent_history.push(IntentEntry {
            intent: state.intent.as_str().to_string(),
            confidence: state.confidence,
            turn: 1,
            timestamp: chrono::Utc::now(),
        });
        node.execute(&mut state).await;

        let record = node.store.get("s1").unwrap();
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.last_intent.as_deref(), Some("QA"));
        assert_eq!(state.intent_history.len(), 1);
    }

    #[tokio::test]
    async fn crossing_threshold_triggers_summarization() {
        let node = new_node(2);
        for i in 0..3 {
            let mut state = ConversationState::new("u".into(), "s2".into(), format!("问题{i}"), Vec::new());
            state.intent = Intent::Qa;
            state.confidence = 0.9;
            state.response = format!("回答{i}");
            state.intent_history.push(IntentEntry {
                intent: state.intent.as_str().to_string(),
                confidence: state.confidence,
                turn: i as u32 + 1,
                timestamp: chrono::Utc::now(),
            });
            node.execute(&mut state).await;
        }
        let record = node.store.get("s2").unwrap();
        assert!(!record.conversation_summary.is_empty());
        assert!(record.history.len() <= 2);
    }
}
