pub mod upload;
pub mod validate;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub use upload::{KnowledgeBase, RecentUploads, UploadClient};
pub use validate::{FileRules, StagedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

/// Session-only record of one upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub name: String,
    /// Empty when the upload failed.
    pub document_id: String,
    pub status: UploadStatus,
    pub timestamp: DateTime<Local>,
}

impl UploadRecord {
    pub fn success(name: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document_id: document_id.into(),
            status: UploadStatus::Success,
            timestamp: Local::now(),
        }
    }

    pub fn failure(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document_id: String::new(),
            status: UploadStatus::Error,
            timestamp: Local::now(),
        }
    }
}

/// Body returned by the upload endpoint. `data` holds the document id.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File size cannot exceed {limit_mb}MB")]
    TooLarge { limit_mb: u64 },
    #[error("Unsupported file type {extension}. Supported types: {}", accepted.join(", "))]
    UnsupportedType {
        extension: String,
        accepted: Vec<String>,
    },
    #[error("Cannot read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upload failed: {message}")]
    Rejected { message: String },
    #[error("Cannot read file: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl Serialize for UploadError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
