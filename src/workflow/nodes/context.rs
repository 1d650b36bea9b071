// src/workflow/nodes/context.rs
// ContextNode (§4.E.1) — loads session-store state into the in-flight
// ConversationState at the start of every turn.

use crate::session::SessionStore;
use crate::workflow::state::ConversationState;

pub struct ContextNode {
    store: std::sync::Arc<SessionStore>,
}

impl ContextNode {
    pub fn new(store: std::sync::Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn execute(&self, state: &mut ConversationState) {
        if let Some(record) = self.store.get(&state.session_id) {
            state.conversation_history = record.history;
            state.user_profile = record.user_profile;
            state.intent_history = record.intent_history;
            state.conversation_summary = record.conversation_summary;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn loads_existing_session_fields() {
        let store = Arc::new(SessionStore::new());
        store.append_turn("s1", "hi".into(), "hello".into());
        store.update(
            "s1",
            crate::session::SessionUpdate {
                conversation_summary: Some("a summary".into()),
                ..Default::default()
            },
        );

        let node = ContextNode::new(store);
        let mut state = ConversationState::new("u".into(), "s1".into(), "next".into(), Vec::new());
        node.execute(&mut state);

        assert_eq!(state.conversation_history.len(), 1);
        assert_eq!(state.conversation_summary, "a summary");
    }

    #[test]
    fn unknown_session_leaves_state_empty() {
        let store = Arc::new(SessionStore::new());
        let node = ContextNode::new(store);
        let mut state = ConversationState::new("u".into(), "missing".into(), "next".into(), Vec::new());
        node.execute(&mut state);
        assert!(state.conversation_history.is_empty());
    }
}
