//! Ingestion coordinator
//!
//! extract → chunk → embed → upsert for one document at a time.

use crate::chunker::Chunker;
use crate::extract::{self, DocumentKind};
use raga_common::config::AppConfig;
use raga_common::embeddings::ensure_dimension;
use raga_common::{metrics, AppError, Chunk, Embedder, Result, VectorIndex, MAX_UPSERT_BATCH};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Outcome of a multi-file ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Filenames in processing order
    pub processed_files: Vec<String>,
    pub total_chunks: usize,
}

/// Turns documents into embedded chunks stored in the vector index
pub struct IngestionCoordinator {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunker: Chunker,
    upsert_batch_size: usize,
}

impl IngestionCoordinator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chunker: Chunker,
        upsert_batch_size: usize,
    ) -> Result<Self> {
        if upsert_batch_size == 0 || upsert_batch_size > MAX_UPSERT_BATCH {
            return Err(AppError::configuration(format!(
                "upsert batch size must be between 1 and {}",
                MAX_UPSERT_BATCH
            )));
        }

        Ok(Self {
            embedder,
            index,
            chunker,
            upsert_batch_size,
        })
    }

    /// Build from configuration with injected capability handles
    pub fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let chunker = Chunker::new(&config.chunking)?;
        Self::new(embedder, index, chunker, config.index.upsert_batch_size)
    }

    /// Ingest one document stored at `path` under the display name `filename`.
    ///
    /// The format is chosen from `filename`, so staged uploads with generated
    /// paths keep their original type and provenance. Batches already upserted
    /// stay in the index if a later batch fails.
    #[instrument(skip(self, path))]
    pub async fn ingest(&self, path: &Path, filename: &str) -> Result<Vec<Chunk>> {
        let start = Instant::now();
        let kind = DocumentKind::from_filename(filename)?;

        let pages = {
            let path = path.to_path_buf();
            let name = filename.to_string();
            tokio::task::spawn_blocking(move || extract::extract_pages(kind, &path, &name))
                .await
                .map_err(|e| AppError::Internal {
                    message: format!("Extraction task failed: {}", e),
                })??
        };

        let mut chunks = Vec::new();
        for page in pages {
            if page.text.trim().is_empty() {
                debug!(page = page.page_number, "Skipping empty page");
                continue;
            }

            let pieces = self.chunker.split(&page.text);
            if pieces.is_empty() {
                continue;
            }

            let embeddings = self.embedder.embed_batch(&pieces).await?;
            if embeddings.len() != pieces.len() {
                return Err(AppError::Embedding {
                    message: format!(
                        "expected {} embeddings, got {}",
                        pieces.len(),
                        embeddings.len()
                    ),
                });
            }

            for (text, embedding) in pieces.into_iter().zip(embeddings) {
                ensure_dimension(&embedding, self.embedder.dimension())?;
                let mut chunk = Chunk::new(text, filename, page.page_number);
                chunk.embedding = embedding;
                chunks.push(chunk);
            }
        }

        self.upsert(&chunks).await?;

        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_ingestion(elapsed, chunks.len(), kind.as_str());
        info!(
            chunks = chunks.len(),
            duration_ms = (elapsed * 1000.0) as u64,
            "Document ingested"
        );

        Ok(chunks)
    }

    /// Ingest `(path, filename)` pairs in order, stopping at the first failure
    pub async fn ingest_all(&self, files: &[(PathBuf, String)]) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        for (path, filename) in files {
            let chunks = self.ingest(path, filename).await?;
            summary.processed_files.push(filename.clone());
            summary.total_chunks += chunks.len();
        }

        Ok(summary)
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        for (batch_no, batch) in chunks.chunks(self.upsert_batch_size).enumerate() {
            let records: Vec<_> = batch.iter().map(Chunk::to_record).collect();
            let written = self.index.upsert(&records).await?;
            debug!(batch = batch_no + 1, written, "Upserted batch");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use raga_common::config::ChunkingConfig;
    use raga_common::embeddings::MockEmbedder;
    use raga_common::index::InMemoryIndex;
    use raga_common::models::{IndexMatch, IndexRecord};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 32;

    fn setup(chunk_size: usize, overlap: usize) -> (Arc<MockEmbedder>, Arc<InMemoryIndex>, IngestionCoordinator) {
        let embedder = Arc::new(MockEmbedder::new(DIM));
        let index = Arc::new(InMemoryIndex::new(DIM));
        let chunker = Chunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        })
        .unwrap();
        let coordinator =
            IngestionCoordinator::new(embedder.clone(), index.clone(), chunker, MAX_UPSERT_BATCH).unwrap();
        (embedder, index, coordinator)
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_single_sentence_txt() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.txt", "The sky is blue.");
        let (_, index, coordinator) = setup(2500, 800);

        let chunks = coordinator.ingest(&path, "a.txt").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_text, "The sky is blue.");
        assert_eq!(chunks[0].source_filename, "a.txt");
        assert_eq!(chunks[0].page_number, 1);
        assert_eq!(chunks[0].embedding.len(), DIM);
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_unsupported_type_touches_nothing() {
        let (embedder, index, coordinator) = setup(2500, 800);

        // The path does not exist: dispatch must fail before any file access
        let err = coordinator
            .ingest(Path::new("/nonexistent/file.xyz"), "file.xyz")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnsupportedFileType { .. }));
        assert_eq!(embedder.calls(), 0);
        assert_eq!(index.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_ingesting_twice_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.txt", &"Lorem ipsum dolor sit amet. ".repeat(20));
        let (_, index, coordinator) = setup(200, 50);

        let first = coordinator.ingest(&path, "notes.txt").await.unwrap();
        let second = coordinator.ingest(&path, "notes.txt").await.unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(index.len().await, first.len() * 2);

        let ids: HashSet<_> = first.iter().chain(&second).map(|c| c.chunk_id.clone()).collect();
        assert_eq!(ids.len(), first.len() * 2);
    }

    #[tokio::test]
    async fn test_upserts_in_batches_of_100() {
        let dir = tempfile::tempdir().unwrap();
        // 250 windows of ten characters each
        let path = write(dir.path(), "big.txt", &"abcdefghi ".repeat(250));
        let (_, index, coordinator) = setup(12, 2);

        let chunks = coordinator.ingest(&path, "big.txt").await.unwrap();
        assert_eq!(chunks.len(), 250);
        assert_eq!(index.upsert_calls(), 3);
        assert_eq!(index.len().await, 250);
    }

    #[tokio::test]
    async fn test_blank_document_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "blank.txt", "  \n\n  ");
        let (embedder, index, coordinator) = setup(2500, 800);

        let chunks = coordinator.ingest(&path, "blank.txt").await.unwrap();
        assert!(chunks.is_empty());
        assert_eq!(embedder.calls(), 0);
        assert_eq!(index.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_ingest_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.txt", "The sky is blue.");
        let b = write(dir.path(), "b.txt", "Grass is green.");
        let (_, index, coordinator) = setup(2500, 800);

        let summary = coordinator
            .ingest_all(&[(a.clone(), "a.txt".into()), (b.clone(), "b.txt".into())])
            .await
            .unwrap();
        assert_eq!(summary.processed_files, vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(summary.total_chunks, 2);

        let result = coordinator
            .ingest_all(&[(a, "a.txt".into()), (b, "b.md".into())])
            .await;
        assert!(matches!(result, Err(AppError::UnsupportedFileType { .. })));
        // a.txt was ingested again before the failure
        assert_eq!(index.len().await, 3);
    }

    /// In-memory index whose `fail_on`-th upsert call is rejected
    struct FlakyIndex {
        inner: InMemoryIndex,
        fail_on: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for FlakyIndex {
        async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(AppError::Index {
                    message: "upsert rejected".into(),
                });
            }
            self.inner.upsert(records).await
        }

        async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
            self.inner.query(vector, top_k).await
        }
    }

    /// Embedder that is always unavailable
    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::Embedding {
                message: "service unavailable".into(),
            })
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::Embedding {
                message: "service unavailable".into(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "big.txt", &"abcdefghi ".repeat(250));
        let index = Arc::new(FlakyIndex {
            inner: InMemoryIndex::new(DIM),
            fail_on: 2,
            calls: AtomicUsize::new(0),
        });
        let chunker = Chunker::new(&ChunkingConfig {
            chunk_size: 12,
            chunk_overlap: 2,
        })
        .unwrap();
        let coordinator = IngestionCoordinator::new(
            Arc::new(MockEmbedder::new(DIM)),
            index.clone(),
            chunker,
            MAX_UPSERT_BATCH,
        )
        .unwrap();

        let err = coordinator.ingest(&path, "big.txt").await.unwrap_err();
        assert!(matches!(err, AppError::Index { .. }));
        // No rollback of the first batch, no attempt at the third
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
        assert_eq!(index.inner.len().await, 100);
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.txt", "The sky is blue.");
        let index = Arc::new(InMemoryIndex::new(DIM));
        let coordinator = IngestionCoordinator::new(
            Arc::new(DownEmbedder),
            index.clone(),
            Chunker::new(&ChunkingConfig::default()).unwrap(),
            MAX_UPSERT_BATCH,
        )
        .unwrap();

        let err = coordinator.ingest(&path, "a.txt").await.unwrap_err();
        assert!(matches!(err, AppError::Embedding { .. }));
        assert_eq!(index.upsert_calls(), 0);
        assert!(index.is_empty().await);
    }

    #[test]
    fn test_rejects_oversized_batches() {
        let chunker = Chunker::new(&ChunkingConfig::default()).unwrap();
        let result = IngestionCoordinator::new(
            Arc::new(MockEmbedder::new(DIM)),
            Arc::new(InMemoryIndex::new(DIM)),
            chunker,
            MAX_UPSERT_BATCH + 1,
        );
        assert!(result.is_err());
    }
}
