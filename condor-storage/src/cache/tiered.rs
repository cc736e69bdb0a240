//! Memory tier in front of the session tier.

use super::{CacheStats, MemoryCache, SessionCache};
use crate::KeyValueStore;
use condor_core::{CacheError, CacheTtlConfig, Clock};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Which tiers an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tiers {
    Memory,
    Session,
    Both,
}

impl Tiers {
    fn memory(self) -> bool {
        matches!(self, Tiers::Memory | Tiers::Both)
    }

    fn session(self) -> bool {
        matches!(self, Tiers::Session | Tiers::Both)
    }
}

/// Per-tier statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TieredStats {
    pub memory: CacheStats,
    pub session: CacheStats,
}

/// Two-tier cache. Reads check memory first, then the session tier, and a
/// session hit is copied back into memory with its remaining lifetime.
#[derive(Debug)]
pub struct TieredCache {
    memory: MemoryCache,
    session: SessionCache,
}

impl TieredCache {
    pub fn new(memory: MemoryCache, session: SessionCache) -> Self {
        Self { memory, session }
    }

    pub fn from_config(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &CacheTtlConfig,
    ) -> Self {
        Self::new(
            MemoryCache::new(clock.clone(), config.memory_ttl()),
            SessionCache::new(store, config.session_prefix.clone(), clock),
        )
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    /// Store `value` in the selected tiers with the same TTL.
    pub fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        tiers: Tiers,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|err| CacheError::Serialization {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        self.set_value(key, value, ttl, tiers)
    }

    pub fn set_value(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        tiers: Tiers,
    ) -> Result<(), CacheError> {
        if tiers.session() {
            self.session.set(key, value.clone(), ttl)?;
        }
        if tiers.memory() {
            self.memory.set(key, value, Some(ttl));
        }
        Ok(())
    }

    /// Live value from the selected tiers, never an expired one.
    pub fn get_value(&self, key: &str, tiers: Tiers) -> Option<Value> {
        if tiers.memory() {
            if let Some(value) = self.memory.get(key) {
                return Some(value);
            }
        }
        if tiers.session() {
            if let Some(entry) = self.session.get_entry(key) {
                let value = entry.value.clone();
                if tiers.memory() {
                    self.memory.restore(entry);
                }
                return Some(value);
            }
        }
        None
    }

    /// Typed read. A payload that no longer decodes is evicted from every tier.
    pub fn get<T: DeserializeOwned>(&self, key: &str, tiers: Tiers) -> Option<T> {
        let value = self.get_value(key, tiers)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Evicting undecodable cache entry");
                if let Err(err) = self.remove(key, Tiers::Both) {
                    tracing::warn!(key = %key, error = %err, "Failed to evict cache entry");
                }
                None
            }
        }
    }

    pub fn remove(&self, key: &str, tiers: Tiers) -> Result<(), CacheError> {
        if tiers.memory() {
            self.memory.remove(key);
        }
        if tiers.session() {
            self.session.remove(key)?;
        }
        Ok(())
    }

    pub fn clear(&self, tiers: Tiers) -> Result<(), CacheError> {
        if tiers.memory() {
            self.memory.clear();
        }
        if tiers.session() {
            self.session.clear()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> TieredStats {
        TieredStats {
            memory: self.memory.stats(),
            session: self.session.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKeyValueStore;
    use condor_core::ManualClock;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
    }

    fn tiered(clock: &ManualClock, store: &InMemoryKeyValueStore) -> TieredCache {
        TieredCache::from_config(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            &CacheTtlConfig::default(),
        )
    }

    fn sample() -> Sample {
        Sample {
            name: "bloco".to_string(),
        }
    }

    #[test]
    fn test_session_hit_restores_memory() {
        let clock = ManualClock::fixed();
        let store = InMemoryKeyValueStore::new();
        let cache = tiered(&clock, &store);
        cache
            .set("k", &sample(), Duration::from_secs(60), Tiers::Session)
            .unwrap();
        assert!(cache.memory().is_empty());

        assert_eq!(cache.get::<Sample>("k", Tiers::Both), Some(sample()));
        assert_eq!(cache.memory().len(), 1);
    }

    #[test]
    fn test_restart_reads_from_session_store() {
        let clock = ManualClock::fixed();
        let store = InMemoryKeyValueStore::new();
        tiered(&clock, &store)
            .set("k", &sample(), Duration::from_secs(60), Tiers::Both)
            .unwrap();

        let fresh = tiered(&clock, &store);
        assert_eq!(fresh.get::<Sample>("k", Tiers::Memory), None);
        assert_eq!(fresh.get::<Sample>("k", Tiers::Both), Some(sample()));
    }

    #[test]
    fn test_get_never_returns_expired() {
        let clock = ManualClock::fixed();
        let store = InMemoryKeyValueStore::new();
        let cache = tiered(&clock, &store);
        cache
            .set("k", &sample(), Duration::from_secs(60), Tiers::Both)
            .unwrap();
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get::<Sample>("k", Tiers::Both), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_undecodable_payload_is_evicted() {
        let clock = ManualClock::fixed();
        let store = InMemoryKeyValueStore::new();
        let cache = tiered(&clock, &store);
        cache
            .set("k", &42u32, Duration::from_secs(60), Tiers::Both)
            .unwrap();
        assert_eq!(cache.get::<Sample>("k", Tiers::Both), None);
        assert_eq!(cache.get_value("k", Tiers::Both), None);
    }

    #[test]
    fn test_clear_both_tiers() {
        let clock = ManualClock::fixed();
        let store = InMemoryKeyValueStore::new();
        let cache = tiered(&clock, &store);
        cache
            .set("a", &sample(), Duration::from_secs(60), Tiers::Both)
            .unwrap();
        cache.clear(Tiers::Both).unwrap();
        assert_eq!(cache.get::<Sample>("a", Tiers::Both), None);
        let stats = cache.stats();
        assert_eq!(stats.memory.entry_count, 0);
        assert_eq!(stats.session.entry_count, 0);
    }
}
