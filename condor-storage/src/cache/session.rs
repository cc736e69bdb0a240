//! Session tier: entries serialized into a [`KeyValueStore`] under a prefix.

use super::entry::{CacheEntry, CacheStats, StatsCounter};
use crate::KeyValueStore;
use condor_core::{CacheError, Clock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Cache tier that survives restarts when backed by a durable store.
///
/// TTL is enforced lazily: a read of an expired entry deletes it and misses.
pub struct SessionCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    clock: Arc<dyn Clock>,
    stats: StatsCounter,
}

impl SessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            clock,
            stats: StatsCounter::default(),
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, value, self.clock.now(), ttl);
        let encoded = serde_json::to_string(&entry).map_err(|err| CacheError::Serialization {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        self.store.set(&self.storage_key(key), &encoded)
    }

    /// Live entry for `key`. Unreadable entries are dropped and miss.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let storage_key = self.storage_key(key);
        let raw = match self.store.get(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.stats.miss();
                return None;
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Session cache read failed");
                self.stats.miss();
                return None;
            }
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Dropping unreadable session cache entry");
                self.discard(&storage_key);
                self.stats.miss();
                return None;
            }
        };

        if entry.is_expired(self.clock.now()) {
            self.discard(&storage_key);
            self.stats.expired();
            return None;
        }
        self.stats.hit();
        Some(entry)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).map(|entry| entry.value)
    }

    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(&self.storage_key(key))
    }

    /// Remove every entry under this tier's prefix.
    pub fn clear(&self) -> Result<(), CacheError> {
        for key in self.store.keys_with_prefix(&self.prefix)? {
            self.store.remove(&key)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let entry_count = self
            .store
            .keys_with_prefix(&self.prefix)
            .map(|keys| keys.len() as u64)
            .unwrap_or(0);
        self.stats.snapshot(entry_count)
    }

    fn discard(&self, storage_key: &str) {
        if let Err(err) = self.store.remove(storage_key) {
            tracing::warn!(key = %storage_key, error = %err, "Failed to drop session cache entry");
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKeyValueStore;
    use condor_core::ManualClock;
    use serde_json::json;

    #[test]
    fn test_set_writes_under_prefix() {
        let store = InMemoryKeyValueStore::new();
        let cache = SessionCache::new(Arc::new(store.clone()), "cache:", Arc::new(ManualClock::fixed()));
        cache.set("identity", json!({"a": 1}), Duration::from_secs(60)).unwrap();
        assert_eq!(store.keys_with_prefix("cache:").unwrap(), vec!["cache:identity".to_string()]);
        assert_eq!(cache.get("identity"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_expired_read_deletes_entry() {
        let store = InMemoryKeyValueStore::new();
        let clock = ManualClock::fixed();
        let cache = SessionCache::new(Arc::new(store.clone()), "cache:", Arc::new(clock.clone()));
        cache.set("k", json!(1), Duration::from_secs(60)).unwrap();
        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_entry_is_dropped() {
        let store = InMemoryKeyValueStore::new();
        store.set("cache:k", "not json").unwrap();
        let cache = SessionCache::new(Arc::new(store.clone()), "cache:", Arc::new(ManualClock::fixed()));
        assert_eq!(cache.get("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_leaves_foreign_keys() {
        let store = InMemoryKeyValueStore::new();
        store.set("permissions:A", "{}").unwrap();
        let cache = SessionCache::new(Arc::new(store.clone()), "cache:", Arc::new(ManualClock::fixed()));
        cache.set("a", json!(1), Duration::from_secs(60)).unwrap();
        cache.set("b", json!(2), Duration::from_secs(60)).unwrap();
        cache.clear().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("permissions:A").unwrap(), Some("{}".to_string()));
    }
}
