//! # Object Storage
//!
//! Remote persistence of session artifacts behind a narrow trait. Files are
//! keyed `owner/category/filename` so everything a user produces lives under
//! one prefix and logs can later be joined to evaluations by session id.
//!
//! The provider SDK itself is out of scope; the filesystem implementation
//! below mirrors the bucket layout for local deployments and tests, and a
//! cloud-backed implementation drops in behind the same trait.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// Category an uploaded artifact belongs to; doubles as the folder segment
/// of its storage key. Transcripts stay local-only, so they have no
/// category here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactCategory {
    Recording,
    Document,
    Log,
    Evaluation,
}

impl ArtifactCategory {
    pub fn folder(&self) -> &'static str {
        match self {
            ArtifactCategory::Recording => "recordings",
            ArtifactCategory::Document => "documents",
            ArtifactCategory::Log => "logs",
            ArtifactCategory::Evaluation => "evaluations",
        }
    }
}

/// Immutable record of one completed upload. Created once per attempt,
/// never mutated.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    /// Logical owner (username) the key is prefixed with
    pub owner: String,
    pub category: ArtifactCategory,
    /// Full storage key: `owner/folder/filename`
    pub key: String,
    /// Retrieval URL for the stored object
    pub url: String,
    pub filename: String,
    pub content_type: String,
}

/// Typed upload failure reasons.
#[derive(Debug)]
pub enum StorageError {
    /// The local file to upload does not exist
    FileNotFound(PathBuf),

    /// Transfer-level failure
    Io(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            StorageError::Io(msg) => write!(f, "storage transfer failed: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Upload contract: local file in, keyed remote object out.
///
/// `filename` overrides the local file's name in the key when the caller
/// wants a derived name (timestamped recordings, session-keyed logs).
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        local_path: &Path,
        owner: &str,
        category: ArtifactCategory,
        filename: Option<String>,
    ) -> Result<UploadedArtifact, StorageError>;
}

/// MIME type from the file extension, defaulting to a generic binary type.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Filesystem-backed object storage: copies artifacts into a root directory
/// using the same `owner/folder/filename` key scheme a bucket would use.
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn upload(
        &self,
        local_path: &Path,
        owner: &str,
        category: ArtifactCategory,
        filename: Option<String>,
    ) -> Result<UploadedArtifact, StorageError> {
        if !local_path.exists() {
            return Err(StorageError::FileNotFound(local_path.to_path_buf()));
        }

        let filename = match filename {
            Some(name) => name,
            None => local_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_string())
                .ok_or_else(|| StorageError::Io("local path has no file name".to_string()))?,
        };

        let key = format!("{}/{}/{}", owner, category.folder(), filename);
        let dest = self.root.join(&key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &dest).await?;

        let url = format!("file://{}", dest.display());
        Ok(UploadedArtifact {
            owner: owner.to_string(),
            category,
            key,
            url,
            filename,
            content_type: content_type_for(local_path).to_string(),
        })
    }
}
