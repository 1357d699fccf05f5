//! HTTP error responses
//!
//! Every failure is rendered as `{"detail": "..."}`. Pipeline errors are
//! logged in full here; the body only carries the endpoint's public message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use raga_common::errors::{AppError, ErrorResponse};

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    /// Ingestion failure; the error text is part of the public detail
    pub fn ingest(err: &AppError) -> Self {
        tracing::error!(error = %err, code = ?err.code(), "Error during ingest");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("Error processing documents: {}", err),
        }
    }

    /// Query failure; client errors keep their message, everything else is opaque
    pub fn query(err: &AppError) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }

        tracing::error!(error = %err, code = ?err.code(), "Error processing query");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Error while generating answer.".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            tracing::warn!(status = self.status.as_u16(), detail = %self.detail, "Client error");
        }

        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_are_opaque() {
        let err = ApiError::query(&AppError::Generation {
            message: "upstream 503: secret detail".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail, "Error while generating answer.");
    }

    #[test]
    fn test_query_validation_is_bad_request() {
        let err = ApiError::query(&AppError::validation("top_k must be at least 1"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.detail.contains("top_k"));
    }

    #[test]
    fn test_ingest_detail_carries_cause() {
        let err = ApiError::ingest(&AppError::UnsupportedFileType {
            extension: "xyz".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail.starts_with("Error processing documents: Unsupported file type"));
    }
}
