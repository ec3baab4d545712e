//! Revocation list for issued tokens.

use crate::policy::FailurePolicy;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, warn};
use warden_cache::{Cache, CacheError};

/// Prefix applied to every revoked token identifier in the cache.
pub const KEY_PREFIX: &str = "blocked_token:";

/// Default retention for a revoked token: 7 days.
pub const DEFAULT_BLOCK_TTL: Duration = Duration::from_secs(604_800);

const MARKER: &[u8] = b"1";

/// Reasons a token cannot be blocked.
#[derive(Debug, thiserror::Error)]
pub enum BlocklistError {
    /// A zero TTL would write a marker that is already expired.
    #[error("block TTL must be positive")]
    ZeroTtl,

    /// The marker could not be written.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Deny list consulted on every authenticated request.
///
/// Entries expire with the token they revoke, so the list never outgrows the
/// set of tokens that could still be presented. There is no unblock.
pub struct TokenBlocklist<C> {
    cache: C,
    default_ttl: Duration,
    on_cache_error: FailurePolicy,
}

impl<C: Cache> TokenBlocklist<C> {
    /// Create a blocklist with the 7 day default TTL that fails closed.
    #[must_use]
    pub const fn new(cache: C) -> Self {
        Self {
            cache,
            default_ttl: DEFAULT_BLOCK_TTL,
            on_cache_error: FailurePolicy::FailClosed,
        }
    }

    /// Override the TTL used when [`block`](Self::block) receives none.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Override the cache failure behaviour of [`is_blocked`](Self::is_blocked).
    #[must_use]
    pub const fn with_failure_policy(mut self, on_cache_error: FailurePolicy) -> Self {
        self.on_cache_error = on_cache_error;
        self
    }

    /// Revoke `token_id` for `ttl`, or the default TTL.
    ///
    /// Blocking an already blocked token refreshes its TTL.
    ///
    /// # Errors
    /// Returns [`BlocklistError::ZeroTtl`] for a zero TTL and the cache error if
    /// the marker cannot be written.
    pub async fn block(&self, token_id: &str, ttl: Option<Duration>) -> Result<(), BlocklistError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(BlocklistError::ZeroTtl);
        }
        self.cache
            .set(&format!("{KEY_PREFIX}{token_id}"), MARKER, Some(ttl))
            .await?;
        info!(token_id, ttl_secs = ttl.as_secs(), "token blocked");
        Ok(())
    }

    /// Revoke `token_id` until the token's own expiry.
    ///
    /// Returns `false` without writing when the token has already expired.
    ///
    /// # Errors
    /// Returns the cache error if the marker cannot be written.
    pub async fn block_until(
        &self,
        token_id: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, BlocklistError> {
        let remaining = expires_at - OffsetDateTime::now_utc();
        let Ok(ttl) = Duration::try_from(remaining) else {
            return Ok(false);
        };
        if ttl.is_zero() {
            return Ok(false);
        }
        self.block(token_id, Some(ttl)).await?;
        Ok(true)
    }

    /// Whether `token_id` is revoked, surfacing cache failures.
    ///
    /// # Errors
    /// Returns the cache error if the lookup fails.
    pub async fn try_is_blocked(&self, token_id: &str) -> Result<bool, CacheError> {
        self.cache.exists(&format!("{KEY_PREFIX}{token_id}")).await
    }

    /// Whether `token_id` is revoked.
    ///
    /// A cache failure is resolved by the failure policy: fail-closed reports
    /// the token as blocked, fail-open as allowed.
    pub async fn is_blocked(&self, token_id: &str) -> bool {
        match self.try_is_blocked(token_id).await {
            Ok(blocked) => blocked,
            Err(err) => {
                let blocked = !self.on_cache_error.allows();
                warn!(token_id, %err, blocked, "blocklist lookup failed");
                blocked
            }
        }
    }
}
