//! Error types for Raga
//!
//! Provides a single error enum shared by every pipeline stage with:
//! - Distinct variants per failure mode (extraction, embedding, index, rerank,
//!   generation, cache)
//! - Error codes for machine-readable identification
//! - Conversions from std, serde_json and config errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    UnsupportedFileType,

    // Document errors (2xxx)
    ExtractionFailure,

    // External service errors (8xxx)
    EmbeddingFailure,
    RerankFailure,
    GenerationFailure,
    IndexFailure,
    CacheError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    IoError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::UnsupportedFileType => 1002,

            ErrorCode::ExtractionFailure => 2001,

            ErrorCode::EmbeddingFailure => 8001,
            ErrorCode::RerankFailure => 8002,
            ErrorCode::GenerationFailure => 8003,
            ErrorCode::IndexFailure => 8004,
            ErrorCode::CacheError => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IoError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Unsupported file type: {extension:?}")]
    UnsupportedFileType { extension: String },

    #[error("Failed to extract text from {filename}: {message}")]
    Extraction { filename: String, message: String },

    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("Rerank service error: {message}")]
    Rerank { message: String },

    #[error("Generation service error: {message}")]
    Generation { message: String },

    #[error("Vector index error: {message}")]
    Index { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UnsupportedFileType { .. } => ErrorCode::UnsupportedFileType,
            AppError::Extraction { .. } => ErrorCode::ExtractionFailure,
            AppError::Embedding { .. } => ErrorCode::EmbeddingFailure,
            AppError::Rerank { .. } => ErrorCode::RerankFailure,
            AppError::Generation { .. } => ErrorCode::GenerationFailure,
            AppError::Index { .. } => ErrorCode::IndexFailure,
            AppError::Cache { .. } => ErrorCode::CacheError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io(_) => ErrorCode::IoError,
        }
    }

    /// Whether the caller sent something we refuse to process
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. } | AppError::UnsupportedFileType { .. }
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        AppError::Configuration { message: message.into() }
    }
}

/// Structured error body used by the HTTP surface
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::UnsupportedFileType { extension: "xyz".into() };
        assert_eq!(err.code(), ErrorCode::UnsupportedFileType);
        assert_eq!(err.code().as_code(), 1002);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_capability_errors() {
        let err = AppError::Rerank { message: "quota".into() };
        assert!(!err.is_client_error());
        assert_eq!(err.code(), ErrorCode::RerankFailure);

        let err = AppError::Index { message: "timeout".into() };
        assert_eq!(err.code(), ErrorCode::IndexFailure);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert_eq!(err.code(), ErrorCode::IoError);
        assert!(err.to_string().contains("gone"));
    }
}
