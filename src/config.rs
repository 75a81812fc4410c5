//! # Configuration Management
//!
//! Layered application configuration:
//! 1. Built-in defaults (the `Default` impl below)
//! 2. `config.toml` in the working directory, if present
//! 3. Environment variables with the `APP_` prefix (`APP_SERVER_HOST`, ...)
//! 4. Bare `HOST` / `PORT` overrides used by deployment platforms
//!
//! Later sources win. `validate()` runs once at startup so a bad windowing
//! geometry or a zero turn limit fails fast instead of surfacing mid-session.

use crate::audio::WindowConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub interview: InterviewConfig,
    pub artifacts: ArtifactsConfig,
    pub storage: StorageConfig,
}

/// Bind address for the HTTP/WebSocket listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Streaming transcription geometry. All durations are in seconds of
/// 16-bit mono PCM at `sample_rate`.
///
/// The step must stay below the window: the difference is the overlap that
/// lets consecutive window transcriptions be deduplicated at word level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub window_secs: f64,
    pub step_secs: f64,
    /// Chunks shorter than this are not worth sending to transcription
    pub min_transcribe_secs: f64,
}

impl AudioConfig {
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            sample_rate: self.sample_rate,
            window_secs: self.window_secs,
            step_secs: self.step_secs,
            min_transcribe_secs: self.min_transcribe_secs,
        }
    }
}

/// Interview flow policy: turn limit and the fixed texts that bracket the
/// conversation. `{role}` and `{difficulty}` placeholders are substituted
/// at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Questions per interview, opening included
    pub max_questions: u32,
    pub opening_template: String,
    pub closing_text: String,
    /// Optional system-prompt template file; a built-in prompt is used when
    /// the file is missing
    pub prompt_path: String,
    /// Parsed resume text read back as background context at session start
    pub context_path: String,
}

/// Local directories session artifacts are written under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub root_dir: String,
}

/// Remote artifact storage. Uploads are skipped entirely when no root is
/// configured; the local copies always remain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the filesystem-backed object store; `None` disables uploads
    pub root: Option<String>,
    /// Key prefix all uploads for this deployment land under
    pub owner: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8765,
            },
            audio: AudioConfig {
                sample_rate: 16_000,
                window_secs: 4.0,
                step_secs: 3.5,
                min_transcribe_secs: 1.0,
            },
            interview: InterviewConfig {
                max_questions: 5,
                opening_template: "Hello! Welcome to your interview for the {role} position. \
                                   Could you start by briefly introducing yourself?"
                    .to_string(),
                closing_text: "That brings us to the end of the interview. Thank you for your \
                               time, and we will be in touch with the results soon."
                    .to_string(),
                prompt_path: "prompts/interviewer.md".to_string(),
                context_path: "artifacts/context/resume_context.txt".to_string(),
            },
            artifacts: ArtifactsConfig {
                root_dir: "artifacts".to_string(),
            },
            storage: StorageConfig {
                root: None,
                owner: "interviews".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml`, and the environment,
    /// in that order.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms set bare HOST/PORT without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations that cannot work before the server binds.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.sample_rate == 0 {
            return Err(anyhow::anyhow!("Audio sample rate must be greater than 0"));
        }

        if self.audio.step_secs <= 0.0 || self.audio.window_secs <= 0.0 {
            return Err(anyhow::anyhow!(
                "Audio window and step durations must be positive"
            ));
        }

        // Step beyond the window would leave gaps between transcribed
        // windows; equal step means no overlap to deduplicate on.
        if self.audio.step_secs >= self.audio.window_secs {
            return Err(anyhow::anyhow!(
                "Audio step ({:.2}s) must be smaller than the window ({:.2}s)",
                self.audio.step_secs,
                self.audio.window_secs
            ));
        }

        if self.interview.max_questions == 0 {
            return Err(anyhow::anyhow!("Interview must allow at least one question"));
        }

        if self.storage.owner.trim().is_empty() {
            return Err(anyhow::anyhow!("Storage owner cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.interview.max_questions, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_window_geometry_matches_byte_math() {
        let window = AppConfig::default().audio.window_config();
        assert_eq!(window.window_bytes(), 128_000);
        assert_eq!(window.step_bytes(), 112_000);
    }

    #[test]
    fn test_validation_rejects_port_zero() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_step_beyond_window() {
        let mut config = AppConfig::default();
        config.audio.step_secs = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_step_equal_to_window() {
        // Equal step leaves no overlap for the merge to deduplicate on.
        let mut config = AppConfig::default();
        config.audio.step_secs = config.audio.window_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_turn_limit() {
        let mut config = AppConfig::default();
        config.interview.max_questions = 0;
        assert!(config.validate().is_err());
    }
}
