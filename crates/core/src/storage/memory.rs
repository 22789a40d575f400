//! Process-lifetime storage.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::StorageBackend;
use crate::Error;

/// In-memory key/value store with an optional byte quota.
///
/// Usage is counted as the byte length of every key plus its value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once `quota_bytes` would be exceeded.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { entries: RwLock::new(HashMap::new()), quota_bytes: Some(quota_bytes) }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn usage(entries: &HashMap<String, String>) -> usize {
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self.entries.write();
        if let Some(quota) = self.quota_bytes {
            let replaced = entries.get(key).map_or(0, |old| key.len() + old.len());
            let needed = Self::usage(&entries) - replaced + key.len() + value.len();
            if needed > quota {
                return Err(Error::QuotaExceeded(format!("{needed} bytes needed, quota is {quota}")));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}
