//! Key-value cache with expiry shared by the rate limiter and token blocklist.
//!
//! [`Cache`] is the capability set every backend provides. Two variants exist:
//! [`MemoryCache`] for a single process and [`RedisCache`] for a shared
//! networked store. [`CacheBackend`] picks one from [`CacheConfig`] at startup.

mod backend;
mod error;
mod memory;
mod remote;

pub use backend::{CacheBackend, CacheConfig, DEFAULT_CAPACITY};
pub use error::{CacheError, Result};
pub use memory::MemoryCache;
pub use remote::RedisCache;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Uniform key-value store with atomic increment and expiry.
///
/// Once an entry's TTL elapses every operation behaves as if it never existed.
pub trait Cache: Send + Sync {
    /// Read the value stored at `key`.
    ///
    /// # Errors
    /// Returns a [`CacheError`] when the backend fails; a missing key is `Ok(None)`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Overwrite the value at `key`. Without `ttl` the entry never expires on its own.
    ///
    /// # Errors
    /// Returns a [`CacheError`] when the backend fails.
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Atomically increment the counter at `key`, starting from 0 when absent.
    ///
    /// Returns the post-increment value. Any existing expiry is kept.
    ///
    /// # Errors
    /// Returns [`CacheError::NotAnInteger`] when the stored value is not a counter.
    fn incr(&self, key: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Atomically increment the counter at `key` and, in the same operation,
    /// arm `window` as its expiry when it has none.
    ///
    /// An expiry already set is kept, so the window stays anchored to the
    /// increment that created the counter. A counter that somehow lost its
    /// expiry gets `window` again on its next increment.
    ///
    /// # Errors
    /// Returns [`CacheError::NotAnInteger`] when the stored value is not a counter.
    fn incr_with_window(
        &self,
        key: &str,
        window: Duration,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Arm or replace the expiry of `key`. No-op when the key is absent.
    ///
    /// # Errors
    /// Returns a [`CacheError`] when the backend fails.
    fn expire(&self, key: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Whether `key` currently holds a value.
    ///
    /// # Errors
    /// Returns a [`CacheError`] when the backend fails.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Remove `key`. No-op when absent.
    ///
    /// # Errors
    /// Returns a [`CacheError`] when the backend fails.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<C: Cache> Cache for Arc<C> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).set(key, value, ttl)
    }

    fn incr(&self, key: &str) -> impl Future<Output = Result<i64>> + Send {
        (**self).incr(key)
    }

    fn incr_with_window(
        &self,
        key: &str,
        window: Duration,
    ) -> impl Future<Output = Result<i64>> + Send {
        (**self).incr_with_window(key, window)
    }

    fn expire(&self, key: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send {
        (**self).expire(key, ttl)
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        (**self).exists(key)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).delete(key)
    }
}
