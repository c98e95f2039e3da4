//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::MAX_UPLOAD_BYTES;
use crate::pipeline::orchestrator::{ClientInputError, PipelineError, RunFailure, RunReport};
use crate::settings::SettingsError;

/// Structured error response body.
///
/// When a run fails part-way, the partial run summary is flattened in next to
/// `error` so the caller can see what already happened (e.g. archived).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
    #[serde(flatten)]
    pub report: Option<RunReport>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    ClientInput(#[from] ClientInputError),
    #[error("Run failed: {}", .0.error)]
    Run(Box<RunFailure>),
    #[error("Settings unavailable: {0}")]
    Settings(#[from] SettingsError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RunFailure> for ApiError {
    fn from(failure: RunFailure) -> Self {
        match failure.error {
            // Input errors carry no partial state worth reporting.
            PipelineError::ClientInput(e) => ApiError::ClientInput(e),
            _ => ApiError::Run(Box::new(failure)),
        }
    }
}

/// Extractor rejections keep axum's status for oversized bodies and are
/// otherwise reported as a bad request in the usual JSON shape.
fn rejection_error(status: StatusCode, detail: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        tracing::warn!(%status, detail, "Request body rejected");
        ApiError::BadRequest(detail)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

fn client_input_code(err: &ClientInputError) -> &'static str {
    match err {
        ClientInputError::MissingField(_) => "MISSING_FIELD",
        ClientInputError::NoFile | ClientInputError::NoFileSelected => "NO_FILE",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, report) = match self {
            ApiError::ClientInput(e) => {
                (StatusCode::BAD_REQUEST, client_input_code(&e), e.to_string(), None)
            }
            ApiError::Run(failure) => {
                let RunFailure { error, report } = *failure;
                let (status, code) = match &error {
                    PipelineError::ClientInput(e) => (StatusCode::BAD_REQUEST, client_input_code(e)),
                    PipelineError::Routing(_) => (StatusCode::BAD_REQUEST, "ROUTING_FAILED"),
                    PipelineError::Send(_) => (StatusCode::BAD_GATEWAY, "NOTIFICATION_FAILED"),
                    PipelineError::Staging(e) => {
                        tracing::error!(error = %e, "Upload staging failed");
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
                    }
                };
                (status, code, error.to_string(), Some(report))
            }
            ApiError::Settings(e) => {
                tracing::error!(error = %e, "Settings could not be loaded");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SETTINGS_UNAVAILABLE",
                    "Settings are unavailable; check the settings file".to_string(),
                    None,
                )
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("File too large. Maximum {}MB.", limit / (1024 * 1024)),
                None,
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
            report,
        };
        (status, Json(body)).into_response()
    }
}
