use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::analysis::AnalysisError;
use crate::payment::PaymentError;
use crate::uploads::UploadError;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Request failed validation; each entry is one problem
    Validation { message: String, details: Vec<String> },
    /// Well-formed request whose content was refused (upload or checkout checks)
    Rejected { message: String, details: Vec<String> },
    /// Unknown upload, quote or order
    NotFound(String),
    /// Quote validity window has passed
    QuoteExpired(String),
    /// Upload exceeds the configured size
    PayloadTooLarge(String),
    /// Request understood but could not be processed (pricing or gateway refusal)
    Unprocessable(String),
    /// Webhook failed transmission checks
    Unauthorized(String),
    /// Payment gateway unreachable or misbehaving
    Upstream(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::QuoteExpired(_) => StatusCode::GONE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message, .. } => write!(f, "{}", message),
            Self::Rejected { message, .. } => write!(f, "{}", message),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::QuoteExpired(msg) => write!(f, "Quote expired: {}", msg),
            Self::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            Self::Unprocessable(msg) => write!(f, "{}", msg),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            Self::Validation { details, .. } | Self::Rejected { details, .. } => details.clone(),
            _ => Vec::new(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
                "details": details,
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::Validation { .. } => "validation_error",
        AppError::Rejected { .. } => "rejected",
        AppError::NotFound(_) => "not_found",
        AppError::QuoteExpired(_) => "quote_expired",
        AppError::PayloadTooLarge(_) => "payload_too_large",
        AppError::Unprocessable(_) => "unprocessable",
        AppError::Unauthorized(_) => "unauthorized",
        AppError::Upstream(_) => "upstream_error",
        AppError::Internal(_) => "internal_error",
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Invalid(errors) => {
                if errors.iter().any(|e| e.starts_with("File too large")) {
                    Self::PayloadTooLarge(errors.join("; "))
                } else {
                    Self::Rejected {
                        message: "File validation failed".to_string(),
                        details: errors,
                    }
                }
            }
            UploadError::InvalidId(_) => Self::validation(err.to_string(), Vec::new()),
            UploadError::NotFound(_) => Self::NotFound(err.to_string()),
            UploadError::Io(e) => Self::Internal(format!("upload storage: {}", e)),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        Self::validation("Model analysis failed", vec![err.to_string()])
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::OrderNotFound(_) => Self::NotFound(err.to_string()),
            PaymentError::Gateway { .. } => Self::Unprocessable(err.to_string()),
            PaymentError::Auth(_) | PaymentError::InvalidResponse(_) | PaymentError::Http(_) => {
                Self::Upstream(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        Self::validation("Invalid JSON body", vec![err.body_text()])
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_error_display() {
        let error = AppError::NotFound("quote 42".to_string());
        assert_eq!(error.to_string(), "Not found: quote 42");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(error_type_name(&AppError::Unauthorized("test".to_string())), "unauthorized");
        assert_eq!(error_type_name(&AppError::validation("bad", vec![])), "validation_error");
    }

    #[test]
    fn test_upload_error_mapping() {
        let too_large = AppError::from(UploadError::Invalid(vec![
            "File too large: 120MB (max: 100MB)".to_string(),
        ]));
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bad_ext = AppError::from(UploadError::Invalid(vec![
            "Unsupported file extension: .txt".to_string(),
        ]));
        assert_eq!(bad_ext.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let missing = AppError::from(UploadError::NotFound("x.stl".to_string()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_analysis_error_rejects_request() {
        let err = AppError::from(AnalysisError::Processing("slicer offline".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_payment_error_mapping() {
        let refused = AppError::from(PaymentError::Gateway {
            status: StatusCode::BAD_REQUEST,
            message: "INVALID_REQUEST".to_string(),
        });
        assert_eq!(refused.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let auth = AppError::from(PaymentError::Auth("401".to_string()));
        assert_eq!(auth.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_error_response() {
        let error = AppError::validation(
            "Validation failed",
            vec!["uploadId is required".to_string()],
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["type"], "validation_error");
        assert_eq!(json["error"]["details"][0], "uploadId is required");
    }
}
