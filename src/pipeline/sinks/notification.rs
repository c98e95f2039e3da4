//! Notification sink: mails the formatted record, with the upload attached, to
//! the category's recipient.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE as BASE64_URL;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::mime::{build_message, Attachment, MessageParts};
use crate::credentials::{AuthError, CredentialProvider, GMAIL_SEND_SCOPE};
use crate::pipeline::extraction::ExtractedRecord;

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Transport ceiling for a single message.
pub const MESSAGE_SIZE_CEILING: usize = 25 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("Mail credentials unavailable: {0}")]
    Credentials(#[from] AuthError),

    #[error("Failed to read attachment: {0}")]
    Attachment(#[from] std::io::Error),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail service rejected message (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Operator-facing triage bucket for a failed send. Logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailureKind {
    Unauthorized,
    QuotaExceeded,
    InvalidRecipient,
    Other,
}

impl DeliveryFailureKind {
    pub fn classify(err: &SendError) -> Self {
        match err {
            SendError::Credentials(_) => Self::Unauthorized,
            SendError::Rejected { status: 401 | 403, body } if !is_quota(body) => {
                Self::Unauthorized
            }
            SendError::Rejected { status: 429, .. } => Self::QuotaExceeded,
            other => {
                let text = other.to_string().to_lowercase();
                if text.contains("unauthorized") || text.contains("invalid_grant") {
                    Self::Unauthorized
                } else if is_quota(&text) {
                    Self::QuotaExceeded
                } else if text.contains("invalid") && text.contains("recipient") {
                    Self::InvalidRecipient
                } else {
                    Self::Other
                }
            }
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::Unauthorized => "check the service-account key and mailbox delegation",
            Self::QuotaExceeded => "mail API quota exceeded, try again later",
            Self::InvalidRecipient => "check the routing table addresses",
            Self::Other => "see error detail",
        }
    }
}

fn is_quota(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("quota") || text.contains("ratelimit") || text.contains("rate limit")
}

/// Sent message id as returned by the mail service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// One notification, fully resolved.
pub struct Notification<'a> {
    pub record: &'a ExtractedRecord,
    pub attachment: &'a Path,
    pub recipient: &'a str,
    pub cc: &'a [String],
    pub subject: &'a str,
    pub body: &'a str,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification<'_>) -> Result<MessageId, SendError>;
}

/// Sends through the Gmail API as the delegated sender mailbox.
pub struct GmailNotificationSink {
    credentials: Arc<dyn CredentialProvider>,
    sender: String,
    client: reqwest::blocking::Client,
}

impl GmailNotificationSink {
    pub fn new(credentials: Arc<dyn CredentialProvider>, sender: &str) -> Result<Self, SendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SendError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            credentials,
            sender: sender.to_string(),
            client,
        })
    }

    fn send(&self, notification: &Notification<'_>) -> Result<MessageId, SendError> {
        let content = std::fs::read(notification.attachment)?;
        let filename = notification
            .attachment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let boundary = format!("receipt-{}", uuid::Uuid::new_v4().simple());
        let raw = build_message(
            &MessageParts {
                from: &self.sender,
                to: notification.recipient,
                cc: notification.cc,
                subject: notification.subject,
                body: notification.body,
                attachment: Attachment {
                    filename: &filename,
                    content: &content,
                },
            },
            &boundary,
        );
        check_message_size(raw.len());

        let credentials = self.credentials.delegated_credentials(&[GMAIL_SEND_SCOPE])?;
        let response = self
            .client
            .post(GMAIL_SEND_URL)
            .header(reqwest::header::AUTHORIZATION, credentials.bearer())
            .json(&SendRequest {
                raw: BASE64_URL.encode(&raw),
            })
            .send()
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let sent: SendResponse = response
            .json()
            .map_err(|e| SendError::Transport(format!("Unreadable send response: {e}")))?;
        Ok(MessageId(sent.id))
    }
}

#[derive(Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// Warn when a message reaches the transport ceiling. Sending still proceeds.
fn check_message_size(size: usize) -> bool {
    if size > MESSAGE_SIZE_CEILING {
        warn!(
            size,
            ceiling = MESSAGE_SIZE_CEILING,
            "Message size is at the mail transport limit"
        );
        return true;
    }
    false
}

impl NotificationSink for GmailNotificationSink {
    fn notify(&self, notification: &Notification<'_>) -> Result<MessageId, SendError> {
        info!(
            to = notification.recipient,
            cc = notification.cc.len(),
            subject = notification.subject,
            "Sending notification"
        );
        match self.send(notification) {
            Ok(id) => {
                info!(message_id = %id.0, "Notification sent");
                Ok(id)
            }
            Err(e) => {
                let kind = DeliveryFailureKind::classify(&e);
                error!(error = %e, kind = ?kind, hint = kind.hint(), "Notification send failed");
                Err(e)
            }
        }
    }
}

/// A delivered notification as seen by [`MockNotificationSink`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: String,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Vec<u8>,
    pub degraded: bool,
}

/// Mock notification sink. Records every call.
pub struct MockNotificationSink {
    fail_with: Option<String>,
    sent: Mutex<Vec<SentNotification>>,
}

impl MockNotificationSink {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.sent().len()
    }
}

impl Default for MockNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for MockNotificationSink {
    fn notify(&self, notification: &Notification<'_>) -> Result<MessageId, SendError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                recipient: notification.recipient.to_string(),
                cc: notification.cc.to_vec(),
                subject: notification.subject.to_string(),
                body: notification.body.to_string(),
                attachment: std::fs::read(notification.attachment).unwrap_or_default(),
                degraded: notification.record.is_degraded(),
            });
        }
        match &self.fail_with {
            Some(reason) => Err(SendError::Transport(reason.clone())),
            None => {
                std::fs::metadata(notification.attachment)?;
                Ok(MessageId(format!("mock-{}", self.call_count())))
            }
        }
    }
}
