//! Redis-backed cache variant.

use crate::{Cache, CacheError, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::info;

/// Cache delegating to a Redis server.
///
/// Atomicity comes from Redis' own commands (`INCR`, or a script for windowed
/// counters), so no local lock exists. The connection manager reconnects on
/// its own and is cloned per call.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Open a managed connection to `url` (e.g. `redis://127.0.0.1/`).
    ///
    /// # Errors
    /// Returns [`CacheError::Backend`] for a malformed URL and
    /// [`CacheError::Unavailable`] when the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        // The URL may embed credentials, so only the host is logged.
        info!(host = %client.get_connection_info().addr, "connected to redis");
        Ok(Self { conn })
    }

    /// Wrap an already established connection manager.
    #[must_use]
    pub const fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

/// `SET .. PX` rejects zero, so sub-millisecond TTLs round up.
fn set_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn expire_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// `INCR` and expiry arming run server-side as one script; `PTTL` is -1 only
/// for a key without expiry.
const INCR_WITH_WINDOW: &str = r"
local count = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) == -1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";

fn incr_error(key: &str, err: redis::RedisError) -> CacheError {
    if err.kind() == redis::ErrorKind::ResponseError && err.to_string().contains("not an integer") {
        CacheError::NotAnInteger {
            key: key.to_owned(),
        }
    } else {
        CacheError::from(err)
    }
}

impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let (): () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(set_millis(ttl))
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let (): () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1_i64)
            .await
            .map_err(|err: redis::RedisError| incr_error(key, err))
    }

    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64> {
        let mut conn = self.conn.clone();
        redis::cmd("EVAL")
            .arg(INCR_WITH_WINDOW)
            .arg(1)
            .arg(key)
            .arg(set_millis(window))
            .query_async(&mut conn)
            .await
            .map_err(|err| incr_error(key, err))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _armed: bool = conn.pexpire(key, expire_millis(ttl)).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ttl_never_rounds_down_to_zero() {
        assert_eq!(set_millis(Duration::from_micros(10)), 1);
        assert_eq!(set_millis(Duration::from_secs(2)), 2_000);
    }

    #[test]
    fn expire_ttl_saturates() {
        assert_eq!(expire_millis(Duration::from_secs(60)), 60_000);
        assert_eq!(expire_millis(Duration::MAX), i64::MAX);
    }
}
