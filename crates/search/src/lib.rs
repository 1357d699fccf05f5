//! Raga Search Library
//!
//! Query-time pipeline:
//! - Dense retrieval from the vector index
//! - Cross-encoder reranking
//! - Grounded answer generation
//! - Response caching around the whole pipeline

pub mod generation;
pub mod orchestrator;
pub mod rerank;
pub mod retrieval;

pub use generation::{AnswerGenerator, GeneratedAnswer, REFUSAL};
pub use orchestrator::QueryOrchestrator;
pub use rerank::ContextReranker;
pub use retrieval::Retriever;
