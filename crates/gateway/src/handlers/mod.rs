//! API handlers module

pub mod health;
pub mod ingest;
pub mod query;
