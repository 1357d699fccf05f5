//! Raga Ingestion Library
//!
//! Turns uploaded documents into embedded chunks in the vector index:
//! - Format dispatch and text extraction (PDF, TXT, DOCX, CSV)
//! - Recursive character chunking with overlap
//! - Embedding and batched upsert
//! - Staging and cleanup of uploaded files

pub mod chunker;
pub mod cleanup;
pub mod coordinator;
pub mod docx;
pub mod extract;
pub mod pdf;
pub mod tabular;

pub use chunker::Chunker;
pub use coordinator::{IngestSummary, IngestionCoordinator};
pub use extract::{DocumentKind, PageText};
