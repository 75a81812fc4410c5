//! Null collaborator implementations used when no external services are
//! configured. The server stays up and degrades per call: transcription
//! yields empty text, everything else reports an unavailable error that the
//! caller surfaces as a best-effort notice.

use super::{
    ChatMessage, CollaboratorError, DocumentParser, Evaluator, QuestionGenerator, SpeechTone,
    Synthesizer, Transcriber,
};
use async_trait::async_trait;
use std::path::Path;

pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe_pcm16(
        &self,
        _pcm: &[u8],
        _floor_bytes: usize,
    ) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }
}

pub struct DisabledSynthesizer;

#[async_trait]
impl Synthesizer for DisabledSynthesizer {
    async fn synthesize(
        &self,
        _text: &str,
        _tone: SpeechTone,
    ) -> Result<Vec<u8>, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "speech synthesis is not configured".to_string(),
        ))
    }
}

pub struct DisabledQuestionGenerator;

#[async_trait]
impl QuestionGenerator for DisabledQuestionGenerator {
    async fn next_question(&self, _history: &[ChatMessage]) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "question generation is not configured".to_string(),
        ))
    }
}

pub struct DisabledEvaluator;

#[async_trait]
impl Evaluator for DisabledEvaluator {
    async fn evaluate(
        &self,
        _log: &serde_json::Value,
    ) -> Result<serde_json::Value, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "evaluation is not configured".to_string(),
        ))
    }
}

pub struct DisabledDocumentParser;

#[async_trait]
impl DocumentParser for DisabledDocumentParser {
    async fn parse(&self, _path: &Path) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "document parsing is not configured".to_string(),
        ))
    }
}
