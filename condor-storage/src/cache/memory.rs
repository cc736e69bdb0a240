//! In-process memory tier.

use super::entry::{CacheEntry, CacheStats, StatsCounter};
use condor_core::Clock;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Key -> entry map with per-key TTL, living as long as the process.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    stats: StatsCounter,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            default_ttl,
            stats: StatsCounter::default(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value`, using the default TTL when `ttl` is `None`.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let entry = CacheEntry::new(
            key,
            value,
            self.clock.now(),
            ttl.unwrap_or(self.default_ttl),
        );
        self.entries.insert(key.to_string(), entry);
    }

    /// Insert an entry keeping its absolute expiry.
    pub fn restore(&self, entry: CacheEntry) {
        if entry.is_expired(self.clock.now()) {
            return;
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Live value for `key`. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.stats.hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            self.stats.expired();
        } else {
            self.stats.miss();
        }
        None
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len() as u64)
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
