// src/session/mod.rs
// Session Context Store (§4.A) — a process-wide keyed store mapping
// session_id to turn history, running summary, intent trail. Pure
// in-memory variant: spec.md frames a durable backing as an optional
// deployment concern, so there is no failure mode here beyond the lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub const HISTORY_TRIM_SIZE: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentEntry {
    pub intent: String,
    pub confidence: f32,
    pub turn: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub history: Vec<Turn>,
    pub user_profile: Option<serde_json::Value>,
    pub last_intent: Option<String>,
    pub intent_history: Vec<IntentEntry>,
    pub conversation_summary: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields a caller may update in one `update` call; any field left `None`
/// preserves the record's current value.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub history: Option<Vec<Turn>>,
    pub user_profile: Option<serde_json::Value>,
    pub last_intent: Option<String>,
    pub intent_history: Option<Vec<IntentEntry>>,
    pub conversation_summary: Option<String>,
}

pub struct SessionStore {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the full record, or `None` if unknown. Missing new-schema
    /// fields already materialize as empty via `SessionRecord::default()`.
    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.records.read().get(session_id).cloned()
    }

    /// Merges provided fields into the record, creating it if absent.
    /// Unspecified fields are preserved; `updated_at` is always refreshed.
    pub fn update(&self, session_id: &str, update: SessionUpdate) {
        let mut records = self.records.write();
        let record = records.entry(session_id.to_string()).or_default();

        if let Some(history) = update.history {
            record.history = history;
        }
        if let Some(profile) = update.user_profile {
            record.user_profile = Some(profile);
        }
        if let Some(intent) = update.last_intent {
            record.last_intent = Some(intent);
        }
        if let Some(intent_history) = update.intent_history {
            record.intent_history = intent_history;
        }
        if let Some(summary) = update.conversation_summary {
            record.conversation_summary = summary;
        }
        record.updated_at = Some(Utc::now());
    }

    /// Appends a turn and trims history to the most recent `HISTORY_TRIM_SIZE`.
    pub fn append_turn(&self, session_id: &str, user_text: String, assistant_text: String) {
        let mut records = self.records.write();
        let record = records.entry(session_id.to_string()).or_default();

        record.history.push(Turn {
            user: user_text,
            assistant: assistant_text,
            timestamp: Utc::now(),
        });

        if record.history.len() > HISTORY_TRIM_SIZE {
            let excess = record.history.len() - HISTORY_TRIM_SIZE;
            record.history.drain(0..excess);
        }

        record.updated_at = Some(Utc::now());
    }

    pub fn clear(&self, session_id: &str) {
        self.records.write().remove(session_id);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_session_is_none() {
        let store = SessionStore::new();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn append_turn_trims_to_twenty() {
        let store = SessionStore::new();
        for i in 0..25 {
            store.append_turn("s1", format!("u{i}"), format!("a{i}"));
        }
        let record = store.get("s1").unwrap();
        assert_eq!(record.history.len(), HISTORY_TRIM_SIZE);
        assert_eq!(record.history.first().unwrap().user, "u5");
        assert_eq!(record.history.last().unwrap().user, "u24");
    }

    #[test]
    fn update_preserves_unspecified_fields() {
        let store = SessionStore::new();
        store.update(
            "s1",
            SessionUpdate {
                last_intent: Some("QA".to_string()),
                ..Default::default()
            },
        );
        store.update(
            "s1",
            SessionUpdate {
                conversation_summary: Some("summary text".to_string()),
                ..Default::default()
            },
        );

        let record = store.get("s1").unwrap();
        assert_eq!(record.last_intent.as_deref(), Some("QA"));
        assert_eq!(record.conversation_summary, "summary text");
    }

    #[test]
    fn clear_removes_entry() {
        let store = SessionStore::new();
        store.append_turn("s1", "hi".to_string(), "hello".to_string());
        store.clear("s1");
        assert!(store.get("s1").is_none());
    }
}
