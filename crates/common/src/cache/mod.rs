//! Response cache
//!
//! Provides:
//! - String key → string value storage with per-entry expiry
//! - Redis backend (shared across processes)
//! - In-memory backend (single process, lazy expiry)
//! - Cache key builders

use crate::config::CacheConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Key/value cache with get and set-with-expiry semantics
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Get a live value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Redis cache client
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    pub async fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Cache {
                message: format!("Failed to create Redis client: {}", e)
            })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(key).await
            .map_err(|e| AppError::Cache {
                message: format!("Failed to get key '{}': {}", key, e),
            })?;

        debug!(key, hit = value.is_some(), "Cache lookup");
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn.set_ex(key, value, ttl_secs)
            .await
            .map_err(|e| AppError::Cache {
                message: format!("Failed to set key '{}': {}", key, e),
            })?;

        debug!(key, ttl_secs, "Cache set");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::Cache {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// In-process cache; expired entries are dropped on read
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }

    /// Number of `get` calls received
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set_ex` calls received
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Drop `key` if it is still expired under the write lock.
    /// Returns the value when a `set_ex` refreshed the entry in the meantime.
    async fn remove_if_expired(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        Ok(self.remove_if_expired(key).await)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Create a response cache based on configuration
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<dyn ResponseCache>> {
    match config.provider.as_str() {
        "redis" => Ok(Arc::new(RedisCache::new(&config.url).await?)),
        "memory" => Ok(Arc::new(InMemoryCache::new())),
        other => Err(AppError::configuration(format!(
            "unknown cache provider: {}",
            other
        ))),
    }
}

/// Cache key builder helpers
pub mod keys {
    /// Namespace for cached query responses
    pub const QUERY_PREFIX: &str = "query_cache";

    /// Build the cache key for a query response.
    ///
    /// Only case is folded: whitespace differences produce distinct keys and
    /// `top_k` is not part of the key, so the same text asked with different
    /// `top_k` values shares one entry.
    pub fn query(query: &str) -> String {
        format!("{}:{}", QUERY_PREFIX, query.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_key() {
        assert_eq!(keys::query("What color is the SKY?"), "query_cache:what color is the sky?");
        assert_eq!(keys::query("Sky"), keys::query("sKY"));
        assert_ne!(keys::query("sky "), keys::query("sky"));
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.gets(), 2);
        assert_eq!(cache.sets(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_expiry() {
        let cache = InMemoryCache::new();
        cache.set_ex("k", "v", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_purge_keeps_refreshed_entry() {
        let cache = InMemoryCache::new();
        cache.set_ex("k", "old", Duration::ZERO).await.unwrap();
        assert_eq!(cache.remove_if_expired("k").await, None);
        assert!(cache.entries.read().await.is_empty());

        // Entry rewritten between the expired read and the purge
        cache.set_ex("k", "new", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.remove_if_expired("k").await, Some("new".to_string()));
        assert_eq!(cache.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let config = CacheConfig {
            provider: "memcached".into(),
            ..CacheConfig::default()
        };
        assert!(create_cache(&config).await.is_err());
    }
}
