//! # Interview Sessions
//!
//! Session state for one interview tied to one connection: the ordered
//! conversation history, the question currently awaiting an answer, the
//! turn counter, and the structured log that becomes the persisted artifact.
//!
//! ## Lifecycle:
//! `SettingUp` → `AwaitingAnswer` → (turns) → `Evaluating` → `Closed`.
//! `end_interview` or a disconnect jumps straight to removal from the
//! registry without finalizing a log.
//!
//! A session is never shared across connections and has at most one mutator
//! at a time: the connection's own message-processing sequence plus the
//! background turn tasks it spawns, serialized through the registry's
//! per-session mutex.

pub mod driver;

use crate::providers::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Identity of one client connection, generated at accept time and used as
/// the session key everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Interview difficulty. Free-form on the wire; anything unrecognized
/// normalizes to `Medium` rather than failing the setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "EASY" => Difficulty::Easy,
            "HARD" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, opening question not yet delivered
    SettingUp,
    /// A question is out; waiting for the candidate's recorded answer
    AwaitingAnswer,
    /// Turn limit reached; closing + log finalization in progress
    Evaluating,
    /// Finalized; only the late evaluation result may still arrive
    Closed,
}

/// One question/answer exchange in the structured log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub answered_at: DateTime<Utc>,
}

/// Log metadata persisted alongside the question/answer pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMetadata {
    pub role: String,
    pub difficulty: Difficulty,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// The finalized interview log artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewLog {
    pub metadata: LogMetadata,
    pub qa_pairs: Vec<QaPair>,
}

/// Per-connection interview state.
pub struct InterviewSession {
    /// Unique per interview; keys the log and evaluation artifacts
    pub session_id: String,
    pub state: SessionState,
    /// Ordered history: system instructions first, then alternating turns
    pub messages: Vec<ChatMessage>,
    /// The question currently awaiting an answer
    pub current_question: String,
    /// Questions asked so far, opening included
    pub questions_asked: u32,
    pub log: InterviewLog,
}

impl InterviewSession {
    pub fn new(role: &str, difficulty: Difficulty, system_messages: Vec<ChatMessage>) -> Self {
        let started_at = Utc::now();
        Self {
            // Timestamp-derived id keeps log and evaluation filenames
            // human-sortable; uniqueness per interview is what matters.
            session_id: started_at.format("%Y%m%d_%H%M%S%3f").to_string(),
            state: SessionState::SettingUp,
            messages: system_messages,
            current_question: String::new(),
            questions_asked: 0,
            log: InterviewLog {
                metadata: LogMetadata {
                    role: role.to_string(),
                    difficulty,
                    started_at,
                    ended_at: None,
                },
                qa_pairs: Vec::new(),
            },
        }
    }

    /// Stamp the end time; called once when the session finalizes.
    pub fn finalize_log(&mut self) {
        self.log.metadata.ended_at = Some(Utc::now());
    }
}

/// Registry of active sessions keyed by connection id. Insert/remove are
/// concurrent-safe; each session carries its own mutex so turn processing
/// for one connection never blocks another.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, Arc<Mutex<InterviewSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ConnectionId, session: InterviewSession) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(id, Arc::new(Mutex::new(session)));
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Mutex<InterviewSession>>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).cloned()
    }

    /// Remove a session, returning whether one existed. Used both for
    /// `end_interview` and disconnect cleanup.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_normalization() {
        assert_eq!(Difficulty::normalize("easy"), Difficulty::Easy);
        assert_eq!(Difficulty::normalize("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::normalize(" medium "), Difficulty::Medium);
        // Unknown values default to medium, never fail.
        assert_eq!(Difficulty::normalize("extreme"), Difficulty::Medium);
        assert_eq!(Difficulty::normalize(""), Difficulty::Medium);
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_registry_insert_get_remove() {
        let registry = SessionRegistry::new();
        let id = ConnectionId::new();

        let session = InterviewSession::new("Software Engineer", Difficulty::Medium, Vec::new());
        registry.insert(id, session);

        assert!(registry.contains(&id));
        assert_eq!(registry.active_count(), 1);

        let handle = registry.get(&id).unwrap();
        assert_eq!(
            handle.lock().unwrap().log.metadata.role,
            "Software Engineer"
        );

        assert!(registry.remove(&id));
        assert!(!registry.contains(&id));
        // A second remove is a no-op, not an error.
        assert!(!registry.remove(&id));
    }

    #[test]
    fn test_log_serializes_with_metadata() {
        let mut session = InterviewSession::new("Data Engineer", Difficulty::Hard, Vec::new());
        session.log.qa_pairs.push(QaPair {
            question: "Tell me about yourself.".to_string(),
            answer: "I build pipelines.".to_string(),
            answered_at: Utc::now(),
        });
        session.finalize_log();

        let json = serde_json::to_value(&session.log).unwrap();
        assert_eq!(json["metadata"]["role"], "Data Engineer");
        assert_eq!(json["metadata"]["difficulty"], "HARD");
        assert!(json["metadata"]["ended_at"].is_string());
        assert_eq!(json["qa_pairs"].as_array().unwrap().len(), 1);
    }
}
