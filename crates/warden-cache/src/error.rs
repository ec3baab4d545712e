//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while talking to a cache backend.
///
/// A missing key is never an error: reads report it as `None` / `false`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend could not be reached (refused, dropped, timed out).
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with an error.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// `incr` targeted a value that is not an integer.
    #[error("Value at '{key}' is not an integer")]
    NotAnInteger {
        /// Offending key.
        key: String,
    },

    /// In-process store is full of live entries and cannot take a new key.
    #[error("Cache full: {capacity} live entries")]
    CapacityExhausted {
        /// Configured entry bound.
        capacity: usize,
    },

    /// In-process store lock was poisoned by a panicking holder.
    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    /// True when the failure means "cache unreachable" rather than a bad request.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            Self::Unavailable(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}
