//! Fixed-window request limiting on top of the shared cache.

use crate::policy::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use warden_cache::{Cache, CacheError};

/// Prefix applied to every limiter key in the cache.
pub const KEY_PREFIX: &str = "ratelimit:";

/// Header carrying the configured limit.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the requests left in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header telling the client how long to back off.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Requests allowed per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Requests accepted per window.
    pub max_requests: u32,
    /// Window length in seconds, counted from the first request.
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Strict policy for LLM-backed operations: 10 requests per minute.
    pub const LLM: Self = Self::new(10, 60);
    /// Loose policy for general API traffic: 100 requests per minute.
    pub const API: Self = Self::new(100, 60);

    /// Build a policy.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Whether both bounds are positive.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.max_requests > 0 && self.window_secs > 0
    }
}

/// Quota state after an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests accepted per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitInfo {
    /// Headers to attach to a successful response.
    #[must_use]
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
        ]
    }
}

/// Quota exhausted for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit of {limit} requests exceeded; retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    /// Requests accepted per window.
    pub limit: u32,
    /// Always zero.
    pub remaining: u32,
    /// Seconds the client should wait; the full window length.
    pub retry_after_secs: u64,
}

impl RateLimitExceeded {
    /// Headers to attach to the 429 response.
    #[must_use]
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RETRY_AFTER, self.retry_after_secs.to_string()),
        ]
    }
}

/// Reasons [`RateLimiter::check`] rejects a request.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Quota exhausted.
    #[error(transparent)]
    Exceeded(#[from] RateLimitExceeded),

    /// Cache failed under [`FailurePolicy::FailClosed`].
    #[error("rate limit state unavailable: {0}")]
    Unavailable(#[source] CacheError),
}

/// Fixed-window counter per caller-supplied identity.
///
/// The window starts with the first request for a key and resets once its
/// expiry elapses. Safe for concurrent use: counting relies on the cache's
/// atomic increment.
pub struct RateLimiter<C> {
    cache: C,
    policy: RateLimitPolicy,
    on_cache_error: FailurePolicy,
}

impl<C: Cache> RateLimiter<C> {
    /// Create a limiter that fails closed when the cache is unreachable.
    #[must_use]
    pub const fn new(cache: C, policy: RateLimitPolicy) -> Self {
        Self {
            cache,
            policy,
            on_cache_error: FailurePolicy::FailClosed,
        }
    }

    /// Override the cache failure behaviour.
    #[must_use]
    pub const fn with_failure_policy(mut self, on_cache_error: FailurePolicy) -> Self {
        self.on_cache_error = on_cache_error;
        self
    }

    /// Configured policy.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Count one request for `key` and decide whether it is allowed.
    ///
    /// # Errors
    /// Returns [`RateLimitError::Exceeded`] once the window's quota is used up,
    /// and [`RateLimitError::Unavailable`] if the cache fails while failing closed.
    pub async fn check(&self, key: &str) -> Result<RateLimitInfo, RateLimitError> {
        let cache_key = format!("{KEY_PREFIX}{key}");
        let count = match self.count(&cache_key).await {
            Ok(count) => count,
            Err(err) => return self.on_failure(key, err),
        };

        let limit = self.policy.max_requests;
        if count > u64::from(limit) {
            warn!(key, count, limit, "rate limit exceeded");
            return Err(RateLimitExceeded {
                limit,
                remaining: 0,
                retry_after_secs: self.policy.window_secs,
            }
            .into());
        }

        let remaining = u32::try_from(u64::from(limit) - count).unwrap_or(0);
        debug!(key, count, remaining, "rate limit check passed");
        Ok(RateLimitInfo {
            limit,
            remaining,
            window_secs: self.policy.window_secs,
        })
    }

    async fn count(&self, cache_key: &str) -> Result<u64, CacheError> {
        let count = self
            .cache
            .incr_with_window(cache_key, self.policy.window())
            .await?;
        u64::try_from(count).map_err(|_| CacheError::NotAnInteger {
            key: cache_key.to_owned(),
        })
    }

    fn on_failure(&self, key: &str, err: CacheError) -> Result<RateLimitInfo, RateLimitError> {
        if self.on_cache_error.allows() {
            warn!(key, %err, "rate limit cache failed; allowing request");
            return Ok(RateLimitInfo {
                limit: self.policy.max_requests,
                remaining: self.policy.max_requests,
                window_secs: self.policy.window_secs,
            });
        }
        warn!(key, %err, "rate limit cache failed; denying request");
        Err(RateLimitError::Unavailable(err))
    }
}
