//! In-memory store for tests and ephemeral sessions.

use super::{KeyValueStore, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let map = self.entries.read().map_err(|_| StorageError::Lock)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut map = self.entries.write().map_err(|_| StorageError::Lock)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut map = self.entries.write().map_err(|_| StorageError::Lock)?;
        map.remove(key);
        Ok(())
    }
}
