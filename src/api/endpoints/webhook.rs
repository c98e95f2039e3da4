//! `POST /webhook/invoice`: reshape an analysis result into the flat
//! automation event and echo it back. Lets operators check their automation
//! mapping without running a full intake.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::pipeline::extraction::SENTINEL;
use crate::pipeline::sinks::{ArchiveReference, AutomationEvent};

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub analysis_result: Option<serde_json::Value>,
    #[serde(default)]
    pub archive_file_id: Option<String>,
}

pub async fn format_event(
    request: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<Json<AutomationEvent>, ApiError> {
    let Json(request) = request?;
    let analysis = match request.analysis_result {
        None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
        Some(value @ serde_json::Value::Object(_)) => value,
        Some(_) => {
            return Err(ApiError::BadRequest(
                "analysis_result must be a JSON object".into(),
            ))
        }
    };

    let mut event: AutomationEvent = serde_json::from_value(analysis)
        .map_err(|e| ApiError::BadRequest(format!("Invalid analysis_result: {e}")))?;

    event.archive_url = match request.archive_file_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => ArchiveReference::new(id).view_url(),
        _ => SENTINEL.to_string(),
    };

    Ok(Json(event))
}
