//! In-process cache for weather records with absolute and sliding expiration.
//!
//! Expiry is checked lazily on every read; [`spawn_sweeper`] can additionally drop
//! expired entries in the background so idle keys don't pile up.

use dashmap::DashMap;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::WeatherRecord;

/// How long an entry stays valid: `absolute` from creation, `sliding` from last access.
/// Whichever window closes first evicts the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub absolute: Duration,
    pub sliding: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: WeatherRecord,
    pub policy: ExpirationPolicy,
    pub created_at: Instant,
    pub last_accessed: Instant,
}

impl CacheEntry {
    pub fn new(value: WeatherRecord, policy: ExpirationPolicy, now: Instant) -> Self {
        Self {
            value,
            policy,
            created_at: now,
            last_accessed: now,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.policy.absolute
            || now.saturating_duration_since(self.last_accessed) > self.policy.sliding
    }
}

/// Storage capability used by [`crate::WeatherService`].
///
/// Implementations must make each call atomic per key; no ordering is promised
/// across different keys.
pub trait WeatherCache: Send + Sync + Debug {
    /// Returns the live record for `key`, refreshing its sliding window.
    /// An expired entry is removed and reported as absent.
    fn get(&self, key: &str) -> Option<WeatherRecord>;

    /// Stores `value`, replacing whatever was under `key`.
    fn set(&self, key: &str, value: WeatherRecord, policy: ExpirationPolicy);

    /// Returns true if an entry was removed.
    fn invalidate(&self, key: &str) -> bool;

    /// Drops every expired entry and returns how many were removed.
    fn sweep(&self) -> usize;

    /// Number of stored entries, including expired ones not yet swept.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sharded concurrent map; unrelated keys never wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WeatherCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<WeatherRecord> {
        let now = Instant::now();

        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.last_accessed = now;
                return Some(entry.value.clone());
            }
        }

        // The shard guard is released above; re-check under the removal lock so a
        // fresh entry written in between survives.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            debug!(key, "cache entry expired");
        }
        None
    }

    fn set(&self, key: &str, value: WeatherRecord, policy: ExpirationPolicy) {
        let entry = CacheEntry::new(value, policy, Instant::now());
        self.entries.insert(key.to_string(), entry);
    }

    fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Runs [`WeatherCache::sweep`] every `every` until `shutdown` fires.
pub fn spawn_sweeper(
    cache: Arc<dyn WeatherCache>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = cache.sweep();
                    if evicted > 0 {
                        debug!(evicted, "swept expired cache entries");
                    }
                }
            }
        }
    })
}
