//! Synchronous string key-value stores backing the session cache tier and
//! the permission first-paint cache.

use condor_core::CacheError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Minimal string store. Reads never block on I/O longer than a local file
/// access, so callers may use it from synchronous paths.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Every key starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Process-local store. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|err| err.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ============================================================================
// FILE-BACKED
// ============================================================================

/// JSON-file store that survives restarts.
///
/// Every read goes to disk, so processes sharing the file observe each
/// other's writes. Writes replace the file atomically through a sibling
/// temporary file.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(store_error)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CacheError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(store_error)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|err| CacheError::Serialization {
            key: self.path.display().to_string(),
            reason: err.to_string(),
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let contents =
            serde_json::to_string_pretty(entries).map_err(|err| CacheError::Serialization {
                key: self.path.display().to_string(),
                reason: err.to_string(),
            })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents).map_err(store_error)?;
        std::fs::rename(&tmp, &self.path).map_err(store_error)
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|err| err.into_inner());
        let mut entries = self.load()?;
        change(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .load()?
            .into_keys()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

fn store_error(err: std::io::Error) -> CacheError {
    CacheError::Store {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_clones_share_entries() {
        let store = InMemoryKeyValueStore::new();
        let other = store.clone();
        store.set("a", "1").unwrap();
        assert_eq!(other.get("a").unwrap(), Some("1".to_string()));
        other.remove("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_prefix_listing() {
        let store = InMemoryKeyValueStore::new();
        store.set("cache:x", "1").unwrap();
        store.set("cache:y", "2").unwrap();
        store.set("other", "3").unwrap();
        let mut keys = store.keys_with_prefix("cache:").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache:x".to_string(), "cache:y".to_string()]);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("permissions_version:A", "3").unwrap();
        drop(store);

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("permissions_version:A").unwrap(),
            Some("3".to_string())
        );
    }

    #[test]
    fn test_file_store_sees_writes_from_other_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let writer = FileKeyValueStore::open(&path).unwrap();
        let reader = FileKeyValueStore::open(&path).unwrap();

        assert_eq!(reader.get("k").unwrap(), None);
        writer.set("k", "v").unwrap();
        assert_eq!(reader.get("k").unwrap(), Some("v".to_string()));
    }
}
