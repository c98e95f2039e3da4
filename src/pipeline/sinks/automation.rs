//! Automation sink: one flat JSON event per run, posted to a webhook.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::AUTOMATION_TIMEOUT_SECS;
use crate::pipeline::extraction::{LineItems, StructuredRecord, SENTINEL};

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Automation request failed: {0}")]
    Network(String),

    #[error("Automation endpoint returned error (status {status}): {body}")]
    Status { status: u16, body: String },
}

fn sentinel() -> String {
    SENTINEL.to_string()
}

fn sentinel_items() -> LineItems {
    LineItems::default()
}

/// The event downstream automations consume. Every key is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationEvent {
    #[serde(default = "sentinel")]
    pub invoice_number: String,
    #[serde(default = "sentinel")]
    pub date: String,
    #[serde(default = "sentinel")]
    pub amount: String,
    #[serde(default = "sentinel")]
    pub customer_name: String,
    #[serde(default = "sentinel")]
    pub vendor: String,
    #[serde(default = "sentinel")]
    pub masked_card_suffix: String,
    #[serde(default = "sentinel_items")]
    pub line_items: LineItems,
    #[serde(default = "sentinel")]
    pub billing_address: String,
    #[serde(default = "sentinel")]
    pub payment_method: String,
    #[serde(default = "sentinel")]
    pub archive_url: String,
    #[serde(default = "sentinel")]
    pub category: String,
    #[serde(default = "sentinel")]
    pub reason: String,
    #[serde(default = "sentinel")]
    pub submitter: String,
}

impl AutomationEvent {
    pub fn new(
        record: &StructuredRecord,
        archive_url: Option<&str>,
        category: &str,
        reason: &str,
        submitter: &str,
    ) -> Self {
        let or_sentinel = |value: &str| {
            if value.trim().is_empty() {
                sentinel()
            } else {
                value.to_string()
            }
        };
        Self {
            invoice_number: record.invoice_number.clone(),
            date: record.date.clone(),
            amount: record.amount.clone(),
            customer_name: record.customer_name.clone(),
            vendor: record.vendor.clone(),
            masked_card_suffix: record.masked_card_suffix.clone(),
            line_items: record.line_items.clone(),
            billing_address: record.billing_address.clone(),
            payment_method: record.payment_method.clone(),
            archive_url: or_sentinel(archive_url.unwrap_or_default()),
            category: or_sentinel(category),
            reason: or_sentinel(reason),
            submitter: or_sentinel(submitter),
        }
    }
}

pub trait AutomationSink: Send + Sync {
    fn notify_automation(&self, event: &AutomationEvent) -> Result<(), AutomationError>;
}

/// Posts events to a single configured webhook URL.
pub struct WebhookAutomationSink {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookAutomationSink {
    pub fn new(url: &str) -> Result<Self, AutomationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(AUTOMATION_TIMEOUT_SECS))
            .build()
            .map_err(|e| AutomationError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

impl AutomationSink for WebhookAutomationSink {
    fn notify_automation(&self, event: &AutomationEvent) -> Result<(), AutomationError> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AutomationError::Network(format!(
                        "Timed out after {AUTOMATION_TIMEOUT_SECS}s"
                    ))
                } else {
                    AutomationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AutomationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "Automation event delivered");
        Ok(())
    }
}

/// Mock automation sink. Keeps every event it receives.
pub struct MockAutomationSink {
    fail_with: Option<u16>,
    events: Mutex<Vec<AutomationEvent>>,
}

impl MockAutomationSink {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the endpoint answered `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AutomationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.events().len()
    }
}

impl Default for MockAutomationSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomationSink for MockAutomationSink {
    fn notify_automation(&self, event: &AutomationEvent) -> Result<(), AutomationError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        match self.fail_with {
            Some(status) => Err(AutomationError::Status {
                status,
                body: "mock failure".into(),
            }),
            None => Ok(()),
        }
    }
}
