//! Vector index abstraction
//!
//! Stores `(id, vector, metadata)` records and answers nearest-neighbour
//! queries. Implementations:
//! - Pinecone data-plane REST client
//! - In-memory brute-force cosine index (offline runs and tests)
//!
//! Upserts carry at most [`MAX_UPSERT_BATCH`] records; writes are additive.

use crate::config::IndexConfig;
use crate::errors::{AppError, Result};
use crate::models::{IndexMatch, IndexRecord};
use crate::retry::{error_body, transport_error, with_retry};
use crate::MAX_UPSERT_BATCH;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Trait for vector storage and similarity search
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records; returns the number written
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize>;

    /// Return up to `top_k` matches ordered by descending similarity
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>>;
}

fn index_error(message: String) -> AppError {
    AppError::Index { message }
}

fn check_batch(records: &[IndexRecord]) -> Result<()> {
    if records.len() > MAX_UPSERT_BATCH {
        return Err(AppError::Index {
            message: format!(
                "upsert batch of {} exceeds limit of {}",
                records.len(),
                MAX_UPSERT_BATCH
            ),
        });
    }
    Ok(())
}

/// Pinecone index client
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    host: String,
    namespace: Option<String>,
    max_retries: u32,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

impl PineconeIndex {
    /// Create a client for the index served at `config.host`
    pub fn new(api_key: String, config: &IndexConfig) -> Result<Self> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| AppError::configuration("index.host (or PINECONE_INDEX_HOST) is required"))?;
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            host: host.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(index_error, e))?;

        if !response.status().is_success() {
            return Err(AppError::Index {
                message: format!("{} failed {}", path, error_body(response).await),
            });
        }

        response.json().await.map_err(|e| AppError::Index {
            message: format!("Failed to parse {} response: {}", path, e),
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
        check_batch(records)?;
        if records.is_empty() {
            return Ok(0);
        }

        let request = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };
        let response: UpsertResponse = with_retry("index", self.max_retries, || {
            self.post("/vectors/upsert", &request)
        })
        .await?;

        Ok(response.upserted_count)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = with_retry("index", self.max_retries, || {
            self.post("/query", &request)
        })
        .await?;

        Ok(response.matches)
    }
}

/// In-memory index using brute-force cosine similarity
pub struct InMemoryIndex {
    dimension: usize,
    records: RwLock<Vec<IndexRecord>>,
    upsert_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
            upsert_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    /// Number of stored vectors
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of upsert calls received
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of query calls received
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag_a == 0.0 || mag_b == 0.0 {
            0.0
        } else {
            dot / (mag_a * mag_b)
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AppError::Index {
                message: format!(
                    "vector dimension {} does not match index dimension {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        check_batch(records)?;
        for record in records {
            self.check_dimension(&record.values)?;
        }

        let mut stored = self.records.write().await;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(records.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check_dimension(vector)?;

        let stored = self.records.read().await;
        let mut scored: Vec<(f32, &IndexRecord)> = stored
            .iter()
            .map(|r| (Self::cosine_sim(vector, &r.values), r))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(CmpOrdering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, r)| IndexMatch {
                id: r.id.clone(),
                score,
                metadata: r.metadata.clone(),
            })
            .collect())
    }
}

/// Create a vector index based on configuration
pub fn create_index(config: &IndexConfig, dimension: usize) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => {
            let key = config.api_key.clone().ok_or_else(|| {
                AppError::configuration("index.api_key (or PINECONE_API_KEY) is required")
            })?;
            Ok(Arc::new(PineconeIndex::new(key, config)?))
        }
        "memory" => Ok(Arc::new(InMemoryIndex::new(dimension))),
        other => Err(AppError::configuration(format!(
            "unknown index provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn record(id: &str, values: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            values,
            metadata: ChunkMetadata {
                text: format!("text {}", id),
                source: "a.txt".to_string(),
                page: 1,
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(&[
                record("far", vec![0.0, 1.0]),
                record("near", vec![1.0, 0.1]),
                record("mid", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn test_query_returns_at_most_top_k() {
        let index = InMemoryIndex::new(2);
        index.upsert(&[record("a", vec![1.0, 0.0])]).await.unwrap();

        assert_eq!(index.query(&[1.0, 0.0], 5).await.unwrap().len(), 1);

        index.upsert(&[record("b", vec![0.5, 0.5]), record("c", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.query(&[1.0, 0.0], 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let index = InMemoryIndex::new(1);
        let records: Vec<_> = (0..101).map(|i| record(&i.to_string(), vec![1.0])).collect();

        assert!(matches!(index.upsert(&records).await, Err(AppError::Index { .. })));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension() {
        let index = InMemoryIndex::new(3);
        assert!(index.upsert(&[record("a", vec![1.0])]).await.is_err());
        assert!(index.query(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_same_id_overwrites() {
        let index = InMemoryIndex::new(1);
        index.upsert(&[record("a", vec![1.0])]).await.unwrap();
        index.upsert(&[record("a", vec![1.0])]).await.unwrap();
        assert_eq!(index.len().await, 1);
        assert_eq!(index.upsert_calls(), 2);
    }

    #[test]
    fn test_pinecone_requires_host() {
        let config = IndexConfig {
            api_key: Some("key".into()),
            ..IndexConfig::default()
        };
        assert!(create_index(&config, 4).is_err());

        let config = IndexConfig {
            api_key: Some("key".into()),
            host: Some("raga-abc.svc.pinecone.io".into()),
            ..IndexConfig::default()
        };
        assert!(create_index(&config, 4).is_ok());
    }
}
