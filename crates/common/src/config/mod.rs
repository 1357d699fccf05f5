//! Configuration management for Raga
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Provider key variables (OPENAI_API_KEY, PINECONE_API_KEY, COHERE_API_KEY)
//! - Default values

use crate::errors::{AppError, Result};
use crate::MAX_UPSERT_BATCH;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Text chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Rerank service configuration
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum multipart upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Directory for temporary upload files (system temp dir when unset)
    pub upload_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over from one chunk into the next
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_openai_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension, must match the index
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt (0 disables retry)
    #[serde(default)]
    pub max_retries: u32,

    /// Texts per embedding request
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Index provider: pinecone, memory
    #[serde(default = "default_index_provider")]
    pub provider: String,

    /// API key for the index service
    pub api_key: Option<String>,

    /// Index data-plane host, e.g. https://raga-abc123.svc.pinecone.io
    pub host: Option<String>,

    /// Optional namespace inside the index
    pub namespace: Option<String>,

    /// Records per upsert request (at most 100)
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt (0 disables retry)
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    /// Rerank provider: cohere, mock
    #[serde(default = "default_rerank_provider")]
    pub provider: String,

    /// API key for the rerank service
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// Rerank model
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt (0 disables retry)
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Language model provider: openai, mock
    #[serde(default = "default_openai_provider")]
    pub provider: String,

    /// API key
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// Chat model
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit (provider default when unset)
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt (0 disables retry)
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Cache provider: redis, memory
    #[serde(default = "default_cache_provider")]
    pub provider: String,

    /// Redis URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Response TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Candidates fetched from the index when the caller gives no top_k
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Contexts kept after reranking
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: usize,

    /// top_k used by the HTTP query endpoint when the body omits it
    #[serde(default = "default_request_top_k")]
    pub request_top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "raga_search=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Service name attached to log records
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}
fn default_request_timeout() -> u64 { 300 }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }
fn default_chunk_size() -> usize { 2500 }
fn default_chunk_overlap() -> usize { 800 }
fn default_openai_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_client_timeout() -> u64 { 30 }
fn default_embedding_batch_size() -> usize { 100 }
fn default_index_provider() -> String { "pinecone".to_string() }
fn default_upsert_batch_size() -> usize { MAX_UPSERT_BATCH }
fn default_rerank_provider() -> String { "cohere".to_string() }
fn default_rerank_model() -> String { "rerank-english-v3.0".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_llm_timeout() -> u64 { 60 }
fn default_cache_provider() -> String { "redis".to_string() }
fn default_redis_url() -> String { "redis://localhost:6379/0".to_string() }
fn default_cache_ttl() -> u64 { 86_400 }
fn default_top_k() -> usize { 5 }
fn default_rerank_top_n() -> usize { 3 }
fn default_request_top_k() -> usize { 3 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "raga".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
            )

            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_key_fallbacks();
        Ok(config)
    }

    /// Load from a specific config file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_key_fallbacks();
        Ok(config)
    }

    /// Fill missing provider keys from the conventional provider variables
    fn apply_key_fallbacks(&mut self) {
        let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if self.embedding.api_key.is_none() {
            self.embedding.api_key = from_env("OPENAI_API_KEY");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = from_env("OPENAI_API_KEY");
        }
        if self.index.api_key.is_none() {
            self.index.api_key = from_env("PINECONE_API_KEY");
        }
        if self.index.host.is_none() {
            self.index.host = from_env("PINECONE_INDEX_HOST");
        }
        if self.rerank.api_key.is_none() {
            self.rerank.api_key = from_env("COHERE_API_KEY");
        }
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(AppError::configuration("chunking.chunk_size must be positive"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(AppError::configuration("embedding.dimension must be positive"));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::configuration("embedding.batch_size must be positive"));
        }
        if self.index.upsert_batch_size == 0 || self.index.upsert_batch_size > MAX_UPSERT_BATCH {
            return Err(AppError::configuration(format!(
                "index.upsert_batch_size must be between 1 and {}",
                MAX_UPSERT_BATCH
            )));
        }
        if self.query.top_k == 0 || self.query.rerank_top_n == 0 || self.query.request_top_k == 0 {
            return Err(AppError::configuration("query defaults must be positive"));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Directory where uploads are staged
    pub fn upload_dir(&self) -> PathBuf {
        self.server
            .upload_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_dir: None,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_openai_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_client_timeout(),
            max_retries: 0,
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            api_key: None,
            host: None,
            namespace: None,
            upsert_batch_size: default_upsert_batch_size(),
            timeout_secs: default_client_timeout(),
            max_retries: 0,
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_rerank_provider(),
            api_key: None,
            api_base: None,
            model: default_rerank_model(),
            timeout_secs: default_client_timeout(),
            max_retries: 0,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_openai_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
            max_retries: 0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_cache_provider(),
            url: default_redis_url(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank_top_n: default_rerank_top_n(),
            request_top_k: default_request_top_k(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.chunk_size, 2500);
        assert_eq!(config.chunking.chunk_overlap, 800);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.index.upsert_batch_size, 100);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.query.top_k, 5);
        assert_eq!(config.query.rerank_top_n, 3);
        assert_eq!(config.query.request_top_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_upsert_batch_limit() {
        let mut config = AppConfig::default();
        config.index.upsert_batch_size = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"chunking": {"chunk_size": 100}}"#).unwrap();
        assert_eq!(config.chunking.chunk_size, 100);
        assert_eq!(config.chunking.chunk_overlap, 800);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        // overlap now exceeds size
        assert!(config.validate().is_err());
    }
}
