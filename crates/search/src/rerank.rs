//! Rerank stage
//!
//! Applies a cross-encoder [`Reranker`] to retrieved contexts and reorders
//! them by its relevance scores.

use raga_common::{AppError, Reranker, Result, RetrievedContext};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reorders retrieved contexts with a reranking capability
pub struct ContextReranker {
    reranker: Arc<dyn Reranker>,
}

impl ContextReranker {
    pub fn new(reranker: Arc<dyn Reranker>) -> Self {
        Self { reranker }
    }

    /// Keep the `top_n` most relevant contexts, highest `rerank_score` first.
    ///
    /// Ties keep retrieval order. No capability call is made for an empty
    /// input.
    #[instrument(skip(self, query, contexts), fields(candidates = contexts.len()))]
    pub async fn rerank(
        &self,
        query: &str,
        contexts: Vec<RetrievedContext>,
        top_n: usize,
    ) -> Result<Vec<RetrievedContext>> {
        if top_n == 0 {
            return Err(AppError::validation("top_n must be at least 1"));
        }
        if contexts.is_empty() {
            return Ok(contexts);
        }

        let documents: Vec<String> = contexts.iter().map(|c| c.chunk_text.clone()).collect();
        let scores = self.reranker.rerank(query, &documents, top_n).await?;

        let mut ranked = Vec::with_capacity(scores.len());
        for score in scores {
            let context = contexts.get(score.index).ok_or_else(|| AppError::Rerank {
                message: format!(
                    "result index {} out of range for {} documents",
                    score.index,
                    contexts.len()
                ),
            })?;

            let mut context = context.clone();
            context.rerank_score = Some(score.relevance_score);
            ranked.push((score.index, context));
        }

        ranked.sort_by(|(ia, a), (ib, b)| {
            let (sa, sb) = (a.rerank_score.unwrap_or(0.0), b.rerank_score.unwrap_or(0.0));
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });
        ranked.truncate(top_n.min(contexts.len()));

        debug!(kept = ranked.len(), model = self.reranker.model_name(), "Rerank complete");
        Ok(ranked.into_iter().map(|(_, c)| c).collect())
    }
}
