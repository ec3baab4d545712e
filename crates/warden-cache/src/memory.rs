//! In-process cache variant.

use crate::backend::DEFAULT_CAPACITY;
use crate::{Cache, CacheError, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Cache living in the current address space.
///
/// Every operation holds the lock for its read-modify-write only, which is what
/// makes [`Cache::incr`] atomic. Capacity is bounded, but live entries are never
/// evicted: a write of a new key into a full cache first sweeps expired entries
/// and fails with [`CacheError::CapacityExhausted`] if none were freed.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, Entry>>> {
        self.entries.lock().map_err(|_| CacheError::LockPoisoned)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::MIN.saturating_add(DEFAULT_CAPACITY - 1))
    }
}

/// Look up a live entry, dropping it first if it has expired.
fn live<'a>(
    entries: &'a mut LruCache<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.peek(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.pop(key);
        trace!(key, "dropped expired entry");
        return None;
    }
    entries.get_mut(key)
}

fn store(
    entries: &mut LruCache<String, Entry>,
    key: &str,
    entry: Entry,
    now: Instant,
) -> Result<()> {
    let capacity = entries.cap().get();
    if !entries.contains(key) && entries.len() >= capacity {
        sweep_expired(entries, now);
        if entries.len() >= capacity {
            warn!(key, capacity, "cache full of live entries; rejecting write");
            return Err(CacheError::CapacityExhausted { capacity });
        }
    }
    entries.put(key.to_owned(), entry);
    Ok(())
}

fn sweep_expired(entries: &mut LruCache<String, Entry>, now: Instant) {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| !entry.is_live(now))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key.as_str());
    }
    debug!(swept = expired.len(), "swept expired cache entries");
}

fn deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    // An unrepresentable deadline is as good as no deadline.
    now.checked_add(ttl)
}

fn parse_counter(key: &str, value: &[u8]) -> Result<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| CacheError::NotAnInteger {
            key: key.to_owned(),
        })
}

/// Increment under the caller's lock, arming `window` on a counter without expiry.
fn increment(
    entries: &mut LruCache<String, Entry>,
    key: &str,
    window: Option<Duration>,
) -> Result<i64> {
    let now = Instant::now();
    if let Some(entry) = live(entries, key, now) {
        let next = parse_counter(key, &entry.value)?
            .checked_add(1)
            .ok_or_else(|| CacheError::Backend(format!("increment of '{key}' would overflow")))?;
        entry.value = next.to_string().into_bytes();
        if entry.expires_at.is_none() {
            entry.expires_at = window.and_then(|window| deadline(now, window));
        }
        return Ok(next);
    }
    store(
        entries,
        key,
        Entry {
            value: b"1".to_vec(),
            expires_at: window.and_then(|window| deadline(now, window)),
        },
        now,
    )?;
    Ok(1)
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        Ok(live(&mut entries, key, Instant::now()).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_vec(),
            expires_at: ttl.and_then(|ttl| deadline(now, ttl)),
        };
        let mut entries = self.lock()?;
        store(&mut entries, key, entry, now)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut entries = self.lock()?;
        increment(&mut entries, key, None)
    }

    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64> {
        let mut entries = self.lock()?;
        increment(&mut entries, key, Some(window))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        if let Some(entry) = live(&mut entries, key, now) {
            entry.expires_at = deadline(now, ttl);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        Ok(live(&mut entries, key, Instant::now()).is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.pop(key);
        Ok(())
    }
}
