//! # Session Artifacts
//!
//! Local persistence of everything a session produces: the full-take WAV
//! recording, per-answer transcripts, the structured interview log, uploaded
//! documents, and evaluation results. Each artifact is written locally
//! first; remote upload is best-effort on top and never blocks the session.
//!
//! ## Layout under the artifact root:
//! ```text
//! recordings/   interview_20250101_120000.wav
//! transcripts/  transcript_20250101_120000123.txt
//! logs/         interview_log_20250101_120000123.json
//! documents/    resumes/20250101_120000_resume.pdf
//!               jds/20250101_120000_posting.pdf
//! evaluations/  20250101_120000123.evaluation.json
//! context/      resume_context.txt
//! ```

use crate::audio::write_pcm16_wav;
use crate::error::{AppError, AppResult};
use crate::session::InterviewLog;
use crate::storage::{ArtifactCategory, ObjectStorage, UploadedArtifact};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Document kinds accepted over the upload frame. Anything unrecognized is
/// treated as a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Resume,
    JobDescription,
}

impl DocumentKind {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "jd" | "job_description" | "job description" => DocumentKind::JobDescription,
            _ => DocumentKind::Resume,
        }
    }

    pub fn subdir(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "resumes",
            DocumentKind::JobDescription => "jds",
        }
    }
}

/// Writes session artifacts under a single root directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory layout. Called once at startup so later writes
    /// only ever create leaf files.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for dir in [
            "recordings",
            "transcripts",
            "logs",
            "documents/resumes",
            "documents/jds",
            "evaluations",
            "context",
        ] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// Write the full take as a timestamped WAV file.
    pub fn save_recording(&self, pcm: &[u8], sample_rate: u32) -> AppResult<PathBuf> {
        let filename = format!("interview_{}.wav", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.root.join("recordings").join(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_pcm16_wav(&path, pcm, sample_rate)
            .map_err(|err| AppError::Internal(format!("failed to write recording: {}", err)))?;
        info!(path = %path.display(), bytes = pcm.len(), "Saved interview recording");
        Ok(path)
    }

    /// Write one finalized answer transcript. Timestamped per take, so every
    /// answer of a session keeps its own file.
    pub async fn save_transcript(&self, text: &str) -> AppResult<PathBuf> {
        let path = self.root.join("transcripts").join(format!(
            "transcript_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S%3f")
        ));
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    /// Persist the structured interview log as pretty-printed JSON.
    pub async fn save_log(&self, session_id: &str, log: &InterviewLog) -> AppResult<PathBuf> {
        let path = self
            .root
            .join("logs")
            .join(format!("interview_log_{}.json", session_id));
        let json = serde_json::to_vec_pretty(log)?;
        tokio::fs::write(&path, json).await?;
        info!(path = %path.display(), "Saved interview log");
        Ok(path)
    }

    /// Persist an evaluation result keyed by the session it scores.
    pub async fn save_evaluation(
        &self,
        session_id: &str,
        result: &serde_json::Value,
    ) -> AppResult<PathBuf> {
        let path = self
            .root
            .join("evaluations")
            .join(format!("{}.evaluation.json", session_id));
        let json = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    /// Store an uploaded document under its kind's subdirectory with a
    /// timestamp-prefixed sanitized name. Extensions outside the accepted
    /// set are rewritten to `.pdf`.
    pub async fn save_document(
        &self,
        kind: DocumentKind,
        filename: &str,
        bytes: &[u8],
    ) -> AppResult<PathBuf> {
        let safe = sanitize_filename(filename);
        let named = format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), safe);
        let path = self.root.join("documents").join(kind.subdir()).join(named);
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Saved uploaded document");
        Ok(path)
    }

    /// Write parsed resume text where new sessions pick it up as background
    /// context.
    pub async fn write_context(&self, context_path: &str, text: &str) -> AppResult<()> {
        let path = Path::new(context_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, text).await?;
        Ok(())
    }
}

/// Strip path components and shell-hostile characters from a client-supplied
/// filename, and force an accepted document extension.
pub fn sanitize_filename(raw: &str) -> String {
    // Take only the final path segment; clients may send full paths.
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim();

    let (stem, ext) = match base.rsplit_once('.') {
        Some((s, e)) => (s, e.to_lowercase()),
        None => (base, String::new()),
    };

    let mut safe_stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe_stem.is_empty() {
        safe_stem = "document".to_string();
    }

    let safe_ext = match ext.as_str() {
        "pdf" | "docx" => ext,
        _ => "pdf".to_string(),
    };

    format!("{}.{}", safe_stem, safe_ext)
}

/// Best-effort upload of a local artifact. Failures are logged and swallowed;
/// the local copy is the durable one.
pub async fn upload_artifact(
    storage: &Option<Arc<dyn ObjectStorage>>,
    local_path: &Path,
    owner: &str,
    category: ArtifactCategory,
    filename: Option<String>,
) -> Option<UploadedArtifact> {
    let storage = storage.as_ref()?;
    match storage.upload(local_path, owner, category, filename).await {
        Ok(artifact) => {
            info!(key = %artifact.key, "Uploaded artifact");
            Some(artifact)
        }
        Err(err) => {
            warn!(
                path = %local_path.display(),
                error = %err,
                "Artifact upload failed, keeping local copy only"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Difficulty, InterviewSession};

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.ensure_layout().unwrap();
        (dir, store)
    }

    #[test]
    fn test_sanitize_strips_paths_and_hostile_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd.pdf");
        assert_eq!(sanitize_filename("my resume (final).pdf"), "my_resume__final_.pdf");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.docx"), "cv.docx");
        assert_eq!(sanitize_filename(""), "document.pdf");
    }

    #[test]
    fn test_sanitize_rewrites_unknown_extensions() {
        assert_eq!(sanitize_filename("notes.exe"), "notes.pdf");
        assert_eq!(sanitize_filename("resume.PDF"), "resume.pdf");
        assert_eq!(sanitize_filename("plain"), "plain.pdf");
    }

    #[test]
    fn test_document_kind_from_wire() {
        assert_eq!(DocumentKind::from_wire("jd"), DocumentKind::JobDescription);
        assert_eq!(DocumentKind::from_wire("resume"), DocumentKind::Resume);
        // Unknown kinds fall back to resume.
        assert_eq!(DocumentKind::from_wire("cover_letter"), DocumentKind::Resume);
    }

    #[test]
    fn test_save_recording_writes_wav() {
        let (_dir, store) = store();
        let pcm = vec![0u8; 3200];
        let path = store.save_recording(&pcm, 16_000).unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("interview_"));
        // WAV header plus the samples.
        assert!(std::fs::metadata(&path).unwrap().len() > 3200);
    }

    #[tokio::test]
    async fn test_save_transcript_is_timestamped() {
        let (_dir, store) = store();
        let path = store.save_transcript("I keep systems up.").await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("transcript_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "I keep systems up."
        );
    }

    #[tokio::test]
    async fn test_save_log_roundtrips_json() {
        let (_dir, store) = store();
        let mut session = InterviewSession::new("SRE", Difficulty::Easy, Vec::new());
        session.finalize_log();

        let path = store.save_log(&session.session_id, &session.log).await.unwrap();
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: InterviewLog = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.metadata.role, "SRE");
    }

    #[tokio::test]
    async fn test_save_document_lands_in_kind_subdir() {
        let (_dir, store) = store();
        let path = store
            .save_document(DocumentKind::Resume, "cv.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert!(path.to_str().unwrap().contains("documents/resumes/"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_write_context_creates_parent_dirs(){
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let context_path = dir.path().join("nested/context/resume_context.txt");
        store
            .write_context(context_path.to_str().unwrap(), "ten years of kafka")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&context_path).unwrap(),
            "ten years of kafka"
        );
    }
}
