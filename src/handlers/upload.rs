use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::AppError;
use crate::handlers::AppState;
use crate::metrics;

const FILE_FIELDS: [&str; 2] = ["file", "stl_file"];

/// Parts of an upload form we care about
struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    session_id: Option<String>,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::validation("Malformed multipart body", vec![err.body_text()])
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut session_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if FILE_FIELDS.contains(&name.as_str()) && file.is_none() {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            file = Some((filename, bytes.to_vec()));
        } else if name == "session_id" {
            let value = field.text().await.map_err(multipart_error)?;
            if !value.trim().is_empty() {
                session_id = Some(value.trim().to_string());
            }
        }
    }

    let (filename, bytes) = file.ok_or_else(|| {
        AppError::validation(
            "No STL file provided",
            vec!["Missing file in request. Use 'file' or 'stl_file' field name.".to_string()],
        )
    })?;

    if filename.trim().is_empty() {
        return Err(AppError::validation(
            "No file selected",
            vec!["Empty filename provided".to_string()],
        ));
    }

    Ok(UploadForm {
        filename,
        bytes,
        session_id,
    })
}

/// Handle POST /api/v1/upload/stl
pub async fn upload_stl(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            metrics::record_upload("rejected");
            return Err(e);
        }
    };
    let session_id = form
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let upload = match state.uploads.store(&form.filename, &form.bytes, &session_id).await {
        Ok(upload) => upload,
        Err(e) => {
            warn!(filename = %form.filename, session_id = %session_id, error = %e, "Upload failed");
            metrics::record_upload("rejected");
            return Err(e.into());
        }
    };

    metrics::record_upload("success");
    info!(upload_id = %upload.upload_id, session_id = %session_id, "STL file uploaded");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "STL file uploaded successfully",
            "upload_id": upload.upload_id,
            "session_id": session_id,
            "file_metadata": {
                "filename": upload.original_filename,
                "file_size": upload.size_bytes,
                "file_hash": upload.sha256,
                "upload_timestamp": upload.stored_at.to_rfc3339(),
            },
            "next_steps": {
                "quote_endpoint": "/api/v1/quote/calculate",
                "required_parameters": ["uploadId", "configuration.material"],
            },
        })),
    ))
}

/// Handle POST /api/v1/upload/validate
/// Runs the upload checks without storing anything
pub async fn validate_stl(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;
    let errors = state.uploads.validate(&form.filename, &form.bytes);
    let valid = errors.is_empty();

    let status = if valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    Ok((
        status,
        Json(json!({
            "validation_result": valid,
            "file_info": {
                "filename": form.filename,
                "content_length": form.bytes.len(),
            },
            "errors": errors,
            "message": if valid { "File validation completed" } else { "File validation failed" },
        })),
    ))
}

/// Options for an upload cleanup run. An empty body uses the configured age.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    pub max_age_hours: Option<u64>,
    #[serde(default)]
    pub force_cleanup: bool,
}

impl CleanupRequest {
    /// `force_cleanup` removes every stored file regardless of age
    fn effective_max_age_hours(&self, configured: u64) -> u64 {
        if self.force_cleanup {
            0
        } else {
            self.max_age_hours.unwrap_or(configured)
        }
    }
}

/// Handle POST /api/v1/upload/cleanup
pub async fn cleanup_uploads(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: CleanupRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CleanupRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation("Invalid cleanup request", vec![e.to_string()]))?
    };

    let max_age_hours = request.effective_max_age_hours(state.config.load().uploads.max_age_hours);
    let cleaned = state
        .uploads
        .cleanup_expired(Duration::from_secs(max_age_hours.saturating_mul(3600)))
        .await?;

    info!(cleaned, max_age_hours, force = request.force_cleanup, "Upload cleanup completed");

    Ok(Json(json!({
        "success": true,
        "cleaned_count": cleaned,
        "max_age_hours": max_age_hours,
        "message": format!("Cleanup completed - {} files removed", cleaned),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_age_selection() {
        let request = CleanupRequest::default();
        assert_eq!(request.effective_max_age_hours(24), 24);

        let request: CleanupRequest =
            serde_json::from_value(json!({ "max_age_hours": 2 })).unwrap();
        assert_eq!(request.effective_max_age_hours(24), 2);

        let request: CleanupRequest =
            serde_json::from_value(json!({ "max_age_hours": 48, "force_cleanup": true })).unwrap();
        assert_eq!(request.effective_max_age_hours(24), 0);
    }
}
