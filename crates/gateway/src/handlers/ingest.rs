//! Document ingestion handler

use axum::{
    extract::{Multipart, State},
    Json,
};
use raga_common::AppError;
use raga_ingestion::cleanup::{remove_with_retry, stage_upload, REMOVE_ATTEMPTS, REMOVE_RETRY_DELAY};
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

/// Multipart field carrying the uploaded files
const FILES_FIELD: &str = "files";

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub processed_files: Vec<String>,
    pub total_chunks: usize,
}

/// Ingest every uploaded file in order.
///
/// Each upload is staged to a temporary file that is removed afterwards,
/// whether or not its ingestion succeeded. Files ingested before a failure
/// stay in the index.
pub async fn ingest_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let upload_dir = state.config.upload_dir();
    let mut processed_files = Vec::new();
    let mut total_chunks = 0;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::ingest(&AppError::validation(format!("invalid multipart body: {}", e)))
    })? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::ingest(&AppError::validation("uploaded file has no filename")))?;

        let bytes = field.bytes().await.map_err(|e| {
            ApiError::ingest(&AppError::validation(format!("failed to read {}: {}", filename, e)))
        })?;

        let path = stage_upload(&upload_dir, &filename, &bytes)
            .await
            .map_err(|e| ApiError::ingest(&e))?;

        let result = state.coordinator.ingest(&path, &filename).await;
        remove_with_retry(&path, REMOVE_ATTEMPTS, REMOVE_RETRY_DELAY).await;

        let chunks = result.map_err(|e| ApiError::ingest(&e))?;
        total_chunks += chunks.len();
        processed_files.push(filename);
    }

    if processed_files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    info!(files = processed_files.len(), total_chunks, "Documents ingested");

    Ok(Json(IngestResponse {
        message: "Documents ingested successfully".to_string(),
        processed_files,
        total_chunks,
    }))
}
