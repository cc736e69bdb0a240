//! Cache entries and their usage statistics.

use condor_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A cached JSON payload with an absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub expires_at: Timestamp,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Value, now: Timestamp, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            key: key.into(),
            value,
            expires_at: now.checked_add_signed(ttl).unwrap_or(Timestamp::MAX_UTC),
        }
    }

    /// An entry is expired from its expiry instant onwards.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired reads included.
    pub misses: u64,
    /// Entries dropped because a read found them expired.
    pub expired: u64,
    /// Number of entries currently held.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
        self.miss();
    }

    pub(crate) fn snapshot(&self, entry_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            entry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_entry_expires_at_ttl_boundary() {
        let now = Utc::now();
        let entry = CacheEntry::new("k", Value::Null, now, Duration::from_secs(10));
        assert!(!entry.is_expired(now + chrono::Duration::seconds(9)));
        assert!(entry.is_expired(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_hit_rate() {
        let counter = StatsCounter::default();
        assert_eq!(counter.snapshot(0).hit_rate(), 0.0);
        counter.hit();
        counter.hit();
        counter.hit();
        counter.expired();
        let stats = counter.snapshot(2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired, 1);
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
