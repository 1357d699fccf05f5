//! Dense retrieval
//!
//! Embeds the query with the ingestion embedder and asks the vector index for
//! the nearest chunks.

use raga_common::embeddings::ensure_dimension;
use raga_common::{AppError, Embedder, Result, RetrievedContext, VectorIndex};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Vector retriever over the shared index
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Return at most `top_k` contexts in descending similarity order
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedContext>> {
        if top_k == 0 {
            return Err(AppError::validation("top_k must be at least 1"));
        }

        let vector = self.embedder.embed(query).await?;
        ensure_dimension(&vector, self.embedder.dimension())?;

        let matches = self.index.query(&vector, top_k).await?;
        debug!(matches = matches.len(), "Index query complete");

        Ok(matches
            .into_iter()
            .take(top_k)
            .map(RetrievedContext::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raga_common::embeddings::MockEmbedder;
    use raga_common::index::InMemoryIndex;
    use raga_common::Chunk;

    const DIM: usize = 64;

    async fn seeded(texts: &[&str]) -> (Arc<MockEmbedder>, Arc<InMemoryIndex>) {
        let embedder = Arc::new(MockEmbedder::new(DIM));
        let index = Arc::new(InMemoryIndex::new(DIM));

        let mut records = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let mut chunk = Chunk::new(text.to_string(), "doc.txt", i as u32 + 1);
            chunk.embedding = embedder.embed(text).await.unwrap();
            records.push(chunk.to_record());
        }
        index.upsert(&records).await.unwrap();
        (embedder, index)
    }

    #[tokio::test]
    async fn test_nearest_first() {
        let (embedder, index) = seeded(&[
            "Quarterly revenue grew by ten percent",
            "The sky is blue",
            "Cats sleep most of the day",
        ])
        .await;
        let retriever = Retriever::new(embedder, index);

        let results = retriever.retrieve("The sky is blue", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_text, "The sky is blue");
        assert_eq!(results[0].page_number, 2);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_top_k_larger_than_index() {
        let (embedder, index) = seeded(&["only one"]).await;
        let retriever = Retriever::new(embedder, index);

        assert_eq!(retriever.retrieve("one", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let (embedder, index) = seeded(&["text"]).await;
        let retriever = Retriever::new(embedder.clone(), index.clone());

        let err = retriever.retrieve("text", 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(index.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_index() {
        let embedder = Arc::new(MockEmbedder::new(DIM));
        let index = Arc::new(InMemoryIndex::new(DIM));
        let retriever = Retriever::new(embedder, index);

        assert!(retriever.retrieve("anything", 3).await.unwrap().is_empty());
    }
}
