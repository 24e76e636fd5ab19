//! In-memory TTL cache for rendered responses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Longest interval between expiry sweeps.
pub const MAX_CHECK_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache entry with TTL.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of keys; 0 disables storage
    pub max_keys: usize,
    /// Default TTL in seconds
    pub default_ttl_seconds: u64,
    /// Interval between sweeps of expired entries, in seconds
    pub check_period_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_keys: 1000,
            default_ttl_seconds: 300,
            check_period_seconds: 600,
        }
    }
}

impl CacheConfig {
    /// Default TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Sweep interval as a duration, capped at [`MAX_CHECK_PERIOD`].
    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.check_period_seconds).min(MAX_CHECK_PERIOD)
    }
}

/// In-memory response cache.
///
/// Thread-safe. `set` always overwrites, so concurrent misses on the same
/// key each recompute and the last write wins. Expired entries read as
/// misses and are dropped by [`purge_expired`](Self::purge_expired).
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    /// Creates a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache with custom configuration and time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(config.max_keys.min(4096))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            config,
            clock,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets a live entry, recording a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let value = self
            .entries
            .read()
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone());

        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    /// Stores a value with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl());
    }

    /// Stores a value with a custom TTL, replacing any existing entry.
    ///
    /// When a new key would exceed capacity, expired entries are purged
    /// first, then the least recently set entry is evicted.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if self.config.max_keys == 0 {
            return;
        }

        let key = key.into();
        let now = self.clock.now();
        let mut entries = self.entries.write();

        if !entries.contains_key(&key) && entries.len() >= self.config.max_keys {
            entries.retain(|_, e| !e.is_expired(now));
        }
        if !entries.contains_key(&key) && entries.len() >= self.config.max_keys {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            {
                debug!(key = %oldest_key, "Evicting oldest cache entry");
                entries.remove(&oldest_key);
            }
        }

        entries.insert(key, CacheEntry {
            value,
            stored_at: now,
            ttl,
        });
    }

    /// Removes a cached entry.
    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Removes every entry. Hit and miss counters are kept.
    pub fn flush_all(&self) {
        let mut entries = self.entries.write();
        let flushed = entries.len();
        entries.clear();
        debug!(flushed, "Flushed response cache");
    }

    /// Removes all expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Sums `weight` over every stored entry, expired ones included.
    pub fn weigh(&self, weight: impl Fn(&V) -> usize) -> usize {
        self.entries.read().values().map(|e| weight(&e.value)).sum()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            keys: self.len(),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Stored keys, expired ones included until the next sweep
    pub keys: usize,
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 before the first lookup
    pub hit_rate: f64,
}
