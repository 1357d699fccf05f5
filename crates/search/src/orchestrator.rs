//! Query orchestrator
//!
//! cache check → retrieve → rerank → generate → cache store.
//! Any stage failure, cache access included, aborts the query.

use crate::generation::AnswerGenerator;
use crate::rerank::ContextReranker;
use crate::retrieval::Retriever;
use raga_common::cache::keys;
use raga_common::config::{AppConfig, QueryConfig};
use raga_common::{
    metrics, AppError, Embedder, LanguageModel, QueryResponse, Reranker, ResponseCache, Result,
    VectorIndex,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Runs the full query pipeline behind the response cache
pub struct QueryOrchestrator {
    retriever: Retriever,
    reranker: ContextReranker,
    generator: AnswerGenerator,
    cache: Arc<dyn ResponseCache>,
    ttl: Duration,
    defaults: QueryConfig,
}

impl QueryOrchestrator {
    pub fn new(
        retriever: Retriever,
        reranker: ContextReranker,
        generator: AnswerGenerator,
        cache: Arc<dyn ResponseCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            retriever,
            reranker,
            generator,
            cache,
            ttl,
            defaults: QueryConfig::default(),
        }
    }

    /// Wire the pipeline from configuration and capability handles
    pub fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        model: Arc<dyn LanguageModel>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        let mut orchestrator = Self::new(
            Retriever::new(embedder, index),
            ContextReranker::new(reranker),
            AnswerGenerator::new(model),
            cache,
            config.cache_ttl(),
        );
        orchestrator.defaults = config.query.clone();
        orchestrator
    }

    /// Default `top_k` and `rerank_top_n`
    pub fn defaults(&self) -> &QueryConfig {
        &self.defaults
    }

    /// Response cache used by this pipeline
    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    /// Answer `query` from the indexed documents.
    ///
    /// Cached responses are keyed by the lower-cased query alone, so a hit
    /// returns the stored response verbatim whatever `top_k` was requested.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn query(&self, query: &str, top_k: usize, rerank_top_n: usize) -> Result<QueryResponse> {
        if top_k == 0 || rerank_top_n == 0 {
            return Err(AppError::validation("top_k and rerank_top_n must be at least 1"));
        }

        let start = Instant::now();
        let key = keys::query(query);

        if let Some(raw) = self.cache.get(&key).await? {
            match serde_json::from_str::<QueryResponse>(&raw) {
                Ok(response) => {
                    metrics::record_cache(true);
                    metrics::record_query(start.elapsed().as_secs_f64(), true, response.sources.len());
                    info!("Cache hit");
                    return Ok(response);
                }
                Err(e) => warn!(error = %e, "Discarding unreadable cache entry"),
            }
        }
        metrics::record_cache(false);
        debug!("Cache miss, running pipeline");

        let stage = Instant::now();
        let contexts = self.retriever.retrieve(query, top_k).await?;
        metrics::record_stage("retrieve", stage.elapsed().as_secs_f64());

        let stage = Instant::now();
        let contexts = self.reranker.rerank(query, contexts, rerank_top_n).await?;
        metrics::record_stage("rerank", stage.elapsed().as_secs_f64());

        let stage = Instant::now();
        let generated = self.generator.generate(query, contexts).await?;
        metrics::record_stage("generate", stage.elapsed().as_secs_f64());

        let response = QueryResponse {
            answer: generated.answer,
            sources: generated.contexts_used,
            query: query.to_string(),
        };

        let payload = serde_json::to_string(&response)?;
        self.cache.set_ex(&key, &payload, self.ttl).await?;

        let elapsed = start.elapsed().as_secs_f64();
        metrics::record_query(elapsed, false, response.sources.len());
        info!(
            sources = response.sources.len(),
            duration_ms = (elapsed * 1000.0) as u64,
            "Query answered"
        );

        Ok(response)
    }
}
