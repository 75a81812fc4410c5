//! # External Collaborators
//!
//! The server never runs inference itself. Speech-to-text, text-to-speech,
//! question generation, evaluation, and document parsing are external
//! collaborators consumed through the narrow async traits below, injected
//! at startup so tests can substitute deterministic fakes.
//!
//! Every call can fail independently; failures are surfaced as
//! [`CollaboratorError`] and handled per-call (a dead synthesizer must not
//! take the interview down with it).

pub mod disabled;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A collaborator call failure.
#[derive(Debug, Clone)]
pub enum CollaboratorError {
    /// The collaborator is not configured or not reachable
    Unavailable(String),

    /// The upstream account ran out of quota/credits
    QuotaExhausted(String),

    /// Any other per-call failure
    Failed(String),
}

impl CollaboratorError {
    /// Classify an upstream error message. Quota and credit exhaustion get
    /// their own variant so the client can be told something actionable
    /// instead of a generic failure.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("quota") || lower.contains("credits") || lower.contains("401") {
            CollaboratorError::QuotaExhausted(message)
        } else {
            CollaboratorError::Failed(message)
        }
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, CollaboratorError::QuotaExhausted(_))
    }

    /// Short human-readable message suitable for an `interview_error` frame.
    /// Never includes stack traces or upstream internals.
    pub fn user_facing_message(&self) -> String {
        match self {
            CollaboratorError::QuotaExhausted(_) => {
                "Voice service quota exceeded. Add credits to the speech account or try again later."
                    .to_string()
            }
            _ => "Could not start the interview. Please check your connection and try again."
                .to_string(),
        }
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorError::Unavailable(msg) => write!(f, "collaborator unavailable: {}", msg),
            CollaboratorError::QuotaExhausted(msg) => write!(f, "quota exhausted: {}", msg),
            CollaboratorError::Failed(msg) => write!(f, "collaborator call failed: {}", msg),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// One message of the ordered conversation history fed to the question
/// generator: system instructions first, then alternating turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Delivery tone for synthesized speech, mirroring the voice-tuning
/// categories of the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechTone {
    Intro,
    Technical,
    Behavioral,
    Followup,
    Closing,
}

/// Speech-to-text: one window of PCM16 mono audio in, plain text out.
///
/// Windows shorter than `floor_bytes` are not worth transcribing and must
/// return an empty string rather than an error.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe_pcm16(
        &self,
        pcm: &[u8],
        floor_bytes: usize,
    ) -> Result<String, CollaboratorError>;
}

/// Text-to-speech: text plus a tone hint in, encoded audio bytes out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, tone: SpeechTone)
        -> Result<Vec<u8>, CollaboratorError>;
}

/// Next-question generation from the full ordered conversation history.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn next_question(&self, history: &[ChatMessage]) -> Result<String, CollaboratorError>;
}

/// Post-session evaluation of a finalized interview log (as serialized
/// JSON), returning a structured evaluation document.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, log: &serde_json::Value)
        -> Result<serde_json::Value, CollaboratorError>;
}

/// Extracts plain text from an uploaded document (resume parsing).
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<String, CollaboratorError>;
}

/// The full collaborator bundle a connection needs, cloneable and cheap to
/// pass into spawned work.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub question_generator: Arc<dyn QuestionGenerator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub document_parser: Arc<dyn DocumentParser>,
}

impl Collaborators {
    /// Bundle with every collaborator disabled. The server still runs:
    /// transcriptions come back empty and interview turns report
    /// `interview_error` instead of crashing.
    pub fn disabled() -> Self {
        Self {
            transcriber: Arc::new(disabled::DisabledTranscriber),
            synthesizer: Arc::new(disabled::DisabledSynthesizer),
            question_generator: Arc::new(disabled::DisabledQuestionGenerator),
            evaluator: Arc::new(disabled::DisabledEvaluator),
            document_parser: Arc::new(disabled::DisabledDocumentParser),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_classification() {
        assert!(CollaboratorError::classify("Monthly quota exceeded").is_quota_exhausted());
        assert!(CollaboratorError::classify("insufficient credits remaining").is_quota_exhausted());
        assert!(CollaboratorError::classify("HTTP 401 Unauthorized").is_quota_exhausted());
        assert!(!CollaboratorError::classify("connection reset by peer").is_quota_exhausted());
    }

    #[test]
    fn test_user_facing_message_has_no_internals() {
        let err = CollaboratorError::classify("401 token xyz-secret rejected by api.example.com");
        let msg = err.user_facing_message();
        assert!(!msg.contains("xyz-secret"));
        assert!(msg.to_lowercase().contains("quota"));
    }
}
