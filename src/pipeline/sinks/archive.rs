//! Archive sink: durable copy of the original upload in cloud storage.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::credentials::{AuthError, CredentialProvider, DRIVE_FILE_SCOPE};

const DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive credentials unavailable: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to read file for archiving: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive upload failed: {0}")]
    Network(String),

    #[error("Archive service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Archive service response unreadable: {0}")]
    InvalidResponse(String),
}

/// Opaque id of the archived file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArchiveReference {
    pub file_id: String,
}

impl ArchiveReference {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }

    pub fn view_url(&self) -> String {
        format!("https://drive.google.com/file/d/{}/view", self.file_id)
    }
}

pub trait ArchiveSink: Send + Sync {
    /// Upload the file at `path` under `display_name`.
    fn archive(&self, path: &Path, display_name: &str) -> Result<ArchiveReference, ArchiveError>;
}

/// Google Drive upload into a single configured folder.
pub struct DriveArchiveSink {
    credentials: Arc<dyn CredentialProvider>,
    folder_id: String,
    upload_url: String,
    client: reqwest::blocking::Client,
}

impl DriveArchiveSink {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        folder_id: &str,
    ) -> Result<Self, ArchiveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ArchiveError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            credentials,
            folder_id: folder_id.trim().to_string(),
            upload_url: DRIVE_UPLOAD_URL.to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

/// `multipart/related` body: JSON metadata part, then the file content part.
fn related_body(boundary: &str, metadata: &str, content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

impl ArchiveSink for DriveArchiveSink {
    fn archive(&self, path: &Path, display_name: &str) -> Result<ArchiveReference, ArchiveError> {
        let content = std::fs::read(path)?;
        let credentials = self.credentials.delegated_credentials(&[DRIVE_FILE_SCOPE])?;

        let parents = if self.folder_id.is_empty() {
            Vec::new()
        } else {
            vec![self.folder_id.as_str()]
        };
        let metadata = serde_json::to_string(&FileMetadata {
            name: display_name,
            parents,
        })
        .map_err(|e| ArchiveError::InvalidResponse(e.to_string()))?;
        let content_type = mime_guess::from_path(display_name).first_or_octet_stream();

        let boundary = format!("archive-{}", uuid::Uuid::new_v4().simple());
        let body = related_body(&boundary, &metadata, content_type.essence_str(), &content);

        let response = self
            .client
            .post(&self.upload_url)
            .header(reqwest::header::AUTHORIZATION, credentials.bearer())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .map_err(|e| ArchiveError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ArchiveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .map_err(|e| ArchiveError::InvalidResponse(e.to_string()))?;

        info!(file_id = %uploaded.id, name = display_name, "Upload archived");
        Ok(ArchiveReference::new(uploaded.id))
    }
}

/// Mock archive sink. Records the names it was asked to archive.
pub struct MockArchiveSink {
    fail_with: Option<String>,
    archived: Mutex<Vec<String>>,
}

impl MockArchiveSink {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            archived: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            archived: Mutex::new(Vec::new()),
        }
    }

    pub fn archived(&self) -> Vec<String> {
        self.archived.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.archived().len()
    }
}

impl Default for MockArchiveSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveSink for MockArchiveSink {
    fn archive(&self, path: &Path, display_name: &str) -> Result<ArchiveReference, ArchiveError> {
        if let Ok(mut archived) = self.archived.lock() {
            archived.push(display_name.to_string());
        }
        if let Some(reason) = &self.fail_with {
            return Err(ArchiveError::Network(reason.clone()));
        }
        // Same precondition as the real sink: the staged file must exist.
        std::fs::metadata(path)?;
        Ok(ArchiveReference::new(format!("mock-{display_name}")))
    }
}
