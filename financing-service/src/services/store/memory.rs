use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::{KeyValueStore, StoreResult};

/// Process-local store for development and tests. Not durable.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a key. Not part of the store contract; lets tests simulate
    /// records lost out of band.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(true)
            }
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("invoice:nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryStore::new();
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_prefix_scan_only_matches_prefix() {
        let store = MemoryStore::new();
        store.set("owner:a:invoice:1", "1").await.unwrap();
        store.set("owner:a:invoice:2", "2").await.unwrap();
        store.set("owner:a:advance:3", "3").await.unwrap();
        store.set("owner:ab:invoice:4", "4").await.unwrap();

        let mut values = store.get_by_prefix("owner:a:invoice:").await.unwrap();
        values.sort();
        assert_eq!(values, vec!["1".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn test_set_if_absent_keeps_first_value() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("claim:x", "first").await.unwrap());
        assert!(!store.set_if_absent("claim:x", "second").await.unwrap());
        assert_eq!(store.get("claim:x").await.unwrap().as_deref(), Some("first"));
    }
}
