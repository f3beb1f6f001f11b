//! In-memory storage implementation for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::StoreResult;
use crate::traits::store::{CatalogStore, PriceHistoryStore};
use crate::types::product::{CatalogEntry, IdentityKey, PriceHistoryEntry};

/// In-memory storage for catalog collections and price history.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, IndexMap<IdentityKey, CatalogEntry>>>,
    history: RwLock<Vec<PriceHistoryEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Number of entries in one collection.
    pub fn entry_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map_or(0, IndexMap::len)
    }

    /// Number of price history records.
    pub fn history_len(&self) -> usize {
        self.history.read().unwrap().len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn fetch_collection(&self, collection: &str) -> StoreResult<Vec<CatalogEntry>> {
        Ok(self
            .collections
            .read()
            .unwrap()
            .get(collection)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_entry(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Option<CatalogEntry>> {
        Ok(self
            .collections
            .read()
            .unwrap()
            .get(collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn upsert_entry(&self, collection: &str, entry: &CatalogEntry) -> StoreResult<()> {
        let mut collections = self.collections.write().unwrap();
        let entries = collections.entry(collection.to_string()).or_default();
        let mut stored = entry.clone();
        if let Some(existing) = entries.get(&entry.key) {
            stored.id = existing.id;
            stored.first_seen_at = existing.first_seen_at;
        }
        entries.insert(entry.key.clone(), stored);
        Ok(())
    }

    async fn delete_entry(&self, collection: &str, key: &IdentityKey) -> StoreResult<bool> {
        Ok(self
            .collections
            .write()
            .unwrap()
            .get_mut(collection)
            .and_then(|entries| entries.shift_remove(key))
            .is_some())
    }
}

#[async_trait]
impl PriceHistoryStore for MemoryStore {
    async fn append_price(&self, entry: &PriceHistoryEntry) -> StoreResult<()> {
        self.history.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn history_for(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Vec<PriceHistoryEntry>> {
        Ok(self
            .history
            .read()
            .unwrap()
            .iter()
            .filter(|h| h.collection == collection && &h.key == key)
            .cloned()
            .collect())
    }

    async fn count_history(&self) -> StoreResult<u64> {
        Ok(self.history_len() as u64)
    }
}
