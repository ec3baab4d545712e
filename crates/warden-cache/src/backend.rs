//! Startup selection between the in-process and networked variants.

use crate::{Cache, MemoryCache, RedisCache, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::info;

/// Default number of entries kept by [`MemoryCache`].
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Cache section of the process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection string. When absent the in-process cache is used.
    pub redis_url: Option<String>,

    /// Entry bound for the in-process cache.
    pub capacity: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            capacity: NonZeroUsize::MIN.saturating_add(DEFAULT_CAPACITY - 1),
        }
    }
}

/// The process-wide cache, chosen once from [`CacheConfig`].
pub enum CacheBackend {
    /// In-process store.
    Memory(MemoryCache),
    /// Shared Redis store.
    Redis(RedisCache),
}

impl CacheBackend {
    /// Build the backend described by `config`.
    ///
    /// # Errors
    /// Returns an error if a Redis URL is configured but the connection cannot be established.
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = match config.redis_url.as_deref() {
            Some(url) => Self::Redis(RedisCache::connect(url).await?),
            None => Self::Memory(MemoryCache::new(config.capacity)),
        };
        info!(backend = backend.kind(), "cache backend selected");
        Ok(backend)
    }

    /// Short name of the active variant, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

impl Cache for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Memory(cache) => cache.get(key).await,
            Self::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.set(key, value, ttl).await,
            Self::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        match self {
            Self::Memory(cache) => cache.incr(key).await,
            Self::Redis(cache) => cache.incr(key).await,
        }
    }

    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64> {
        match self {
            Self::Memory(cache) => cache.incr_with_window(key, window).await,
            Self::Redis(cache) => cache.incr_with_window(key, window).await,
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.expire(key, ttl).await,
            Self::Redis(cache) => cache.expire(key, ttl).await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Self::Memory(cache) => cache.exists(key).await,
            Self::Redis(cache) => cache.exists(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.delete(key).await,
            Self::Redis(cache) => cache.delete(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_redis_url_selects_memory() -> Result<()> {
        let backend = CacheBackend::from_config(&CacheConfig::default()).await?;
        assert_eq!(backend.kind(), "memory");
        backend.set("k", b"v", None).await?;
        assert!(backend.exists("k").await?);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_redis_url_is_reported() {
        let config = CacheConfig {
            redis_url: Some("not a url".into()),
            ..CacheConfig::default()
        };
        assert!(CacheBackend::from_config(&config).await.is_err());
    }
}
