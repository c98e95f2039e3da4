//! `POST /analyze`: extraction only, no sinks.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use super::intake::read_upload_form;
use crate::api::error::ApiError;
use crate::api::types::AppContext;
use crate::pipeline::extraction::ExtractedRecord;
use crate::pipeline::orchestrator::ClientInputError;

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub result: ExtractedRecord,
}

pub async fn analyze(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let form = read_upload_form(multipart?).await?;
    let file = form.file.ok_or(ClientInputError::NoFile)?;
    if file.filename.trim().is_empty() {
        return Err(ClientInputError::NoFileSelected.into());
    }

    let pipeline = ctx.pipeline.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.analyze(&file))
        .await
        .map_err(|e| ApiError::Internal(format!("Analyze task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AnalyzeResponse { result }))
}
