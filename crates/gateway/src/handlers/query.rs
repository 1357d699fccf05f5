//! Query handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use raga_common::QueryResponse;
use serde::Deserialize;
use validator::Validate;

use crate::error::ApiError;
use crate::AppState;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,

    /// Candidates fetched from the index (configured default when absent)
    #[validate(range(min = 1, max = 100))]
    pub top_k: Option<usize>,
}

/// Answer a question from the ingested documents
pub async fn query_documents(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    request
        .validate()
        .map_err(|e| ApiError::bad_request(format!("Validation failed: {}", e)))?;
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be blank"));
    }

    let defaults = state.orchestrator.defaults();
    let top_k = request.top_k.unwrap_or(defaults.request_top_k);

    let response = state
        .orchestrator
        .query(&request.query, top_k, defaults.rerank_top_n)
        .await
        .map_err(|e| ApiError::query(&e))?;

    Ok(Json(response))
}
