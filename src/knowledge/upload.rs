use std::collections::VecDeque;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Serialize;

use super::validate::{FileRules, StagedFile};
use super::{UploadError, UploadRecord, UploadResponse, ValidationError};
use crate::api::ApiEndpoints;

/// How many upload records are kept, most recent first.
pub const RECENT_UPLOADS_LIMIT: usize = 5;
const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecentUploads {
    records: VecDeque<UploadRecord>,
}

impl RecentUploads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `record` first and evicts the oldest beyond the limit.
    pub fn push(&mut self, record: UploadRecord) {
        self.records.push_front(record);
        self.records.truncate(RECENT_UPLOADS_LIMIT);
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&UploadRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Multipart client for the knowledge-base ingestion endpoint.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: Client,
    endpoint: String,
}

impl UploadClient {
    pub fn new(endpoints: &ApiEndpoints) -> Self {
        Self::with_client(Client::new(), endpoints)
    }

    pub fn with_client(http: Client, endpoints: &ApiEndpoints) -> Self {
        Self {
            http,
            endpoint: endpoints.file_upload.clone(),
        }
    }

    /// Sends the staged file once and returns the created document id.
    /// `on_progress` receives a 0-100 percentage as the body is transmitted.
    pub async fn upload<F>(&self, staged: &StagedFile, on_progress: F) -> Result<String, UploadError>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let bytes = tokio::fs::read(&staged.path).await?;
        let total = bytes.len() as u64;

        let chunks: Vec<Vec<u8>> = bytes
            .chunks(PROGRESS_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();
        let mut sent = 0u64;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            on_progress(percent(sent, total));
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(staged.file_name.clone());
        let form = Form::new()
            .part("file", part)
            .text("fileName", staged.display_name.clone())
            .text("description", staged.description.clone());

        let resp = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let parsed = serde_json::from_str::<UploadResponse>(&text).ok();

        match parsed {
            Some(body) if status.is_success() && body.success => Ok(body.data.unwrap_or_default()),
            Some(body) if !body.message.is_empty() => Err(UploadError::Rejected {
                message: body.message,
            }),
            _ if !status.is_success() => Err(UploadError::Rejected {
                message: format!("Request failed with status code {}", status.as_u16()),
            }),
            _ => Err(UploadError::Rejected {
                message: "Upload failed".into(),
            }),
        }
    }
}

/// Rounded share of `sent` in `total`.
fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent * 100 + total / 2) / total).min(100) as u8
}

/// Validation, a single upload attempt per confirmation, and the session's
/// recent-upload list.
#[derive(Debug)]
pub struct KnowledgeBase {
    rules: FileRules,
    client: UploadClient,
    recent: RecentUploads,
}

impl KnowledgeBase {
    pub fn new(rules: FileRules, client: UploadClient) -> Self {
        Self {
            rules,
            client,
            recent: RecentUploads::new(),
        }
    }

    pub fn recent(&self) -> &RecentUploads {
        &self.recent
    }

    pub fn select_file(&self, path: &std::path::Path) -> Result<StagedFile, ValidationError> {
        self.rules.select_file(path)
    }

    /// Uploads `staged` and records the outcome. A failed attempt is recorded
    /// as an error entry before the error is returned; nothing is retried.
    pub async fn confirm_upload<F>(
        &mut self,
        staged: StagedFile,
        on_progress: F,
    ) -> Result<UploadRecord, UploadError>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        match self.client.upload(&staged, on_progress).await {
            Ok(document_id) => {
                tracing::info!(file = %staged.file_name, document_id = %document_id, "upload succeeded");
                let record = UploadRecord::success(&staged.file_name, document_id);
                self.recent.push(record.clone());
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(file = %staged.file_name, error = %e, "upload failed");
                self.recent.push(UploadRecord::failure(&staged.file_name));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::UploadStatus;

    #[test]
    fn test_recent_uploads_cap_and_order() {
        let mut recent = RecentUploads::new();
        for i in 1..=6 {
            recent.push(UploadRecord::success(format!("file{}.pdf", i), format!("doc-{}", i)));
        }
        assert_eq!(recent.len(), RECENT_UPLOADS_LIMIT);
        let names: Vec<&str> = recent.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["file6.pdf", "file5.pdf", "file4.pdf", "file3.pdf", "file2.pdf"]
        );
    }

    #[test]
    fn test_failure_record_has_empty_id() {
        let mut recent = RecentUploads::new();
        recent.push(UploadRecord::failure("bad.pdf"));
        let latest = recent.latest().unwrap();
        assert_eq!(latest.status, UploadStatus::Error);
        assert!(latest.document_id.is_empty());
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }
}
