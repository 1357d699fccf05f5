//! Raga Common Library
//!
//! Shared code for the Raga crates including:
//! - Chunk, context and response models
//! - Error types and handling
//! - Configuration management
//! - Capability traits and provider clients (embedding, vector index,
//!   reranking, language model, response cache)
//! - Logging and metrics

pub mod cache;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod rerank;
pub mod retry;

// Re-export commonly used types
pub use cache::ResponseCache;
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::VectorIndex;
pub use llm::LanguageModel;
pub use models::{Chunk, ChunkMetadata, QueryResponse, RetrievedContext};
pub use rerank::Reranker;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Maximum number of records a single index upsert may carry
pub const MAX_UPSERT_BATCH: usize = 100;
