//! # Control/Audio Protocol
//!
//! Frame definitions for the single bidirectional WebSocket channel each
//! client holds. Two frame kinds travel over it:
//!
//! - **Binary frames**: raw PCM16 mono 16 kHz audio samples. Only meaningful
//!   while a recording is active; otherwise silently dropped. They never
//!   appear here — only text frames have structure.
//! - **Text frames**: JSON objects with a `type` discriminator, modeled as
//!   tagged serde enums below.
//!
//! Malformed JSON or an unknown `type` is a protocol error: the offending
//! message is reported and ignored, the connection stays open.

use serde::{Deserialize, Serialize};

fn default_role() -> String {
    "Software Engineer".to_string()
}

fn default_difficulty() -> String {
    "Medium".to_string()
}

fn default_doc_type() -> String {
    "resume".to_string()
}

fn default_filename() -> String {
    "document".to_string()
}

/// Control messages sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Begin accumulating audio; resets all per-turn transcript state.
    StartAudio,

    /// End accumulation: transcribe the final partial window, save the full
    /// recording, and (if a session is active) run one interview turn.
    StopAudio,

    /// Start an interview session for a role at a difficulty.
    InterviewSetup {
        #[serde(default = "default_role")]
        role: String,
        /// Free-form on the wire; normalized to EASY/MEDIUM/HARD server-side
        #[serde(default = "default_difficulty")]
        difficulty: String,
    },

    /// Upload a supporting document (resume or job description) as base64.
    DocumentUpload {
        #[serde(default = "default_doc_type")]
        doc_type: String,
        #[serde(default = "default_filename")]
        filename: String,
        #[serde(default)]
        content: String,
    },

    /// Force-close any active session without finalizing a log.
    EndInterview,
}

/// Frames sent by the server.
///
/// `candidate_transcript` carries the whole running transcript each time —
/// clients replace their displayed value rather than appending.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Greeting sent immediately after accept.
    ServerMessage { text: String },

    /// Running transcript of the candidate's current answer (overwrite
    /// semantics).
    CandidateTranscript { text: String },

    /// Next interviewer question (or closing statement) as text.
    InterviewerText { text: String },

    /// Synthesized speech for an interviewer message, plus the text it
    /// represents.
    InterviewerAudio { audio_base64: String, text: String },

    /// Result of persisting the full-session recording.
    AudioSaved {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        local_path: Option<String>,
        #[serde(rename = "s3_url")]
        storage_url: Option<String>,
    },

    /// Result of a `document_upload` request.
    DocumentUploadResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        local_path: Option<String>,
        #[serde(rename = "s3_url", skip_serializing_if = "Option::is_none")]
        storage_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The session reached its turn limit and closed normally.
    InterviewComplete,

    /// A question could not be generated or synthesized; the connection
    /// stays open. `quota_exceeded` hints that the failure was credit
    /// exhaustion rather than a transient error.
    InterviewError { error: String, quota_exceeded: bool },

    /// Post-session evaluation outcome; delivered asynchronously and may
    /// arrive after `interview_complete`.
    EvaluationResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_stop_audio() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "start_audio"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::StartAudio));
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "stop_audio"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::StopAudio));
    }

    #[test]
    fn test_interview_setup_defaults() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "interview_setup"}"#).unwrap();
        match frame {
            ClientFrame::InterviewSetup { role, difficulty } => {
                assert_eq!(role, "Software Engineer");
                assert_eq!(difficulty, "Medium");
            }
            _ => panic!("wrong frame type"),
        }
    }

    #[test]
    fn test_interview_setup_explicit_fields() {
        let json = r#"{"type": "interview_setup", "role": "Data Engineer", "difficulty": "hard"}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        match frame {
            ClientFrame::InterviewSetup { role, difficulty } => {
                assert_eq!(role, "Data Engineer");
                assert_eq!(difficulty, "hard");
            }
            _ => panic!("wrong frame type"),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type": "self_destruct"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_frame_wire_shape() {
        let frame = ServerFrame::CandidateTranscript {
            text: "hello there".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"candidate_transcript""#));
        assert!(json.contains(r#""text":"hello there""#));
    }

    #[test]
    fn test_audio_saved_uses_s3_url_field() {
        let frame = ServerFrame::AudioSaved {
            success: true,
            local_path: Some("recordings/interview_1.wav".to_string()),
            storage_url: Some("file:///bucket/u/recordings/interview_1.wav".to_string()),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""s3_url""#));
    }

    #[test]
    fn test_interview_error_carries_quota_hint() {
        let frame = ServerFrame::InterviewError {
            error: "Voice service quota exceeded".to_string(),
            quota_exceeded: true,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""quota_exceeded":true"#));
    }
}
