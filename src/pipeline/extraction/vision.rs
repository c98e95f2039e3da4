//! Vision oracle client: one image plus the extraction instruction in, the
//! model's raw text out.
//!
//! Speaks the OpenAI-compatible `/chat/completions` dialect with a single user
//! message carrying a text part and an `image_url` data-URL part.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompt::MAX_RESPONSE_TOKENS;
use super::types::{ImageMime, VisionClient};
use super::ExtractionError;

/// Blocking HTTP client for an OpenAI-compatible vision endpoint.
pub struct OpenAiVisionClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiVisionClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Oracle(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for `/chat/completions`
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// Response body from `/chat/completions`
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(
    model: &'a str,
    instruction: &'a str,
    image_base64: &str,
    mime: ImageMime,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text { text: instruction },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{image_base64}", mime.as_str()),
                    },
                },
            ],
        }],
        max_tokens: MAX_RESPONSE_TOKENS,
    }
}

impl VisionClient for OpenAiVisionClient {
    fn describe_image(
        &self,
        instruction: &str,
        image_base64: &str,
        mime: ImageMime,
    ) -> Result<String, ExtractionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_request(&self.model, instruction, image_base64, mime);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ExtractionError::Oracle(format!("Cannot reach vision endpoint {}", self.base_url))
                } else if e.is_timeout() {
                    ExtractionError::Oracle(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    ExtractionError::Oracle(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::OracleStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractionError::Oracle(format!("Unreadable response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::Oracle("Response contained no message content".into()))
    }
}

/// Mock vision client for testing; returns a configurable response.
pub struct MockVisionClient {
    response: Result<String, String>,
    calls: AtomicUsize,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A client whose every call fails as if the endpoint were down.
    pub fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionClient for MockVisionClient {
    fn describe_image(
        &self,
        _instruction: &str,
        _image_base64: &str,
        _mime: ImageMime,
    ) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(ExtractionError::Oracle)
    }
}
