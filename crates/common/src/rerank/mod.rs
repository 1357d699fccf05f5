//! Reranking capability
//!
//! Second-pass relevance scoring of already-retrieved candidates:
//! - Cohere rerank API (cross-encoder)
//! - Mock: term-overlap scoring, for offline runs and tests

use crate::config::RerankConfig;
use crate::errors::{AppError, Result};
use crate::retry::{error_body, transport_error, with_retry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Relevance of one input document
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerankScore {
    /// Index into the input document list (0-based)
    pub index: usize,
    /// Relevance score, higher is better
    pub relevance_score: f32,
}

/// Trait for cross-encoder reranking
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `documents` against `query`, returning at most `top_n` results
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankScore>>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

fn rerank_error(message: String) -> AppError {
    AppError::Rerank { message }
}

/// Cohere rerank client
pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct CohereResponse {
    results: Vec<RerankScore>,
}

impl CohereReranker {
    pub fn new(api_key: String, config: &RerankConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.cohere.com/v1".to_string()),
            max_retries: config.max_retries,
        })
    }

    async fn make_request(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankScore>> {
        let request = CohereRequest {
            model: &self.model,
            query,
            documents,
            top_n,
        };

        let response = self.client
            .post(format!("{}/rerank", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(rerank_error, e))?;

        if !response.status().is_success() {
            return Err(AppError::Rerank {
                message: format!("API error {}", error_body(response).await),
            });
        }

        let result: CohereResponse = response.json().await.map_err(|e| AppError::Rerank {
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(result.results)
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankScore>> {
        with_retry("rerank", self.max_retries, || self.make_request(query, documents, top_n)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock reranker scoring documents by query term overlap
pub struct MockReranker {
    calls: AtomicUsize,
}

impl MockReranker {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of rerank calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn terms(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankScore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let query_terms = Self::terms(query);
        let mut scores: Vec<RerankScore> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| {
                let overlap = Self::terms(doc).intersection(&query_terms).count();
                RerankScore {
                    index,
                    relevance_score: if query_terms.is_empty() {
                        0.0
                    } else {
                        overlap as f32 / query_terms.len() as f32
                    },
                }
            })
            .collect();

        scores.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores.truncate(top_n);
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        "mock-rerank"
    }
}

/// Create a reranker based on configuration
pub fn create_reranker(config: &RerankConfig) -> Result<Arc<dyn Reranker>> {
    match config.provider.as_str() {
        "cohere" => {
            let key = config.api_key.clone().ok_or_else(|| {
                AppError::configuration("rerank.api_key (or COHERE_API_KEY) is required")
            })?;
            Ok(Arc::new(CohereReranker::new(key, config)?))
        }
        "mock" => Ok(Arc::new(MockReranker::new())),
        other => Err(AppError::configuration(format!(
            "unknown rerank provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_prefers_overlapping_documents() {
        let reranker = MockReranker::new();
        let docs = vec![
            "Revenue grew in the third quarter".to_string(),
            "The sky is blue on clear days".to_string(),
        ];

        let scores = reranker.rerank("what color is the sky", &docs, 2).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].index, 1);
        assert!(scores[0].relevance_score > scores[1].relevance_score);
        assert_eq!(reranker.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_truncates_to_top_n() {
        let reranker = MockReranker::new();
        let docs: Vec<String> = (0..5).map(|i| format!("doc {}", i)).collect();
        assert_eq!(reranker.rerank("doc", &docs, 2).await.unwrap().len(), 2);
    }

    #[test]
    fn test_cohere_response_shape() {
        let body = r#"{"id": "x", "results": [{"index": 2, "relevance_score": 0.91}]}"#;
        let parsed: CohereResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results[0], RerankScore { index: 2, relevance_score: 0.91 });
    }
}
