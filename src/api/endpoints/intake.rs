//! `POST /upload`: full intake run for one receipt.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::AppContext;
use crate::config::MAX_UPLOAD_BYTES;
use crate::pipeline::{RunReport, UploadRequest, UploadedFile};

/// Read the intake form: `file`, `category`, `reason`, `submitter`.
///
/// Unknown fields are ignored. Field presence is not checked here; that is
/// [`UploadRequest::validate`]'s job.
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadRequest, ApiError> {
    let mut request = UploadRequest::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e)),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::PayloadTooLarge {
                        limit: MAX_UPLOAD_BYTES,
                    });
                }
                request.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "category" => request.category = field.text().await.map_err(multipart_error)?,
            "reason" => request.reason = field.text().await.map_err(multipart_error)?,
            "submitter" => request.submitter = field.text().await.map_err(multipart_error)?,
            _ => {}
        }
    }

    Ok(request)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        tracing::warn!("Failed to read multipart form: {e}");
        ApiError::BadRequest(e.body_text())
    }
}

/// Validate, load the current settings, then run the blocking pipeline off
/// the async executor.
pub async fn upload(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RunReport>, ApiError> {
    let request = read_upload_form(multipart?).await?;
    request.validate()?;

    let settings = ctx.settings.load_settings()?;
    let pipeline = ctx.pipeline.clone();

    let report = tokio::task::spawn_blocking(move || pipeline.run(request, settings))
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {e}")))??;

    Ok(Json(report))
}
