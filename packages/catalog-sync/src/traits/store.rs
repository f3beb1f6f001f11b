//! Storage traits for catalog entries and price history.
//!
//! The storage layer is split into focused traits:
//! - `CatalogStore`: one collection of entries per main category
//! - `PriceHistoryStore`: one shared, append-only history
//! - `Catalog`: composite trait combining both
//!
//! Every single-record write must be atomic; nothing here spans records.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::product::{CatalogEntry, IdentityKey, PriceHistoryEntry};

/// Named collections of catalog entries, keyed by identity.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All entries currently persisted in a collection.
    async fn fetch_collection(&self, collection: &str) -> StoreResult<Vec<CatalogEntry>>;

    /// Point lookup by identity key.
    async fn find_entry(&self, collection: &str, key: &IdentityKey)
        -> StoreResult<Option<CatalogEntry>>;

    /// Insert, or overwrite the non-key fields of the entry with the same key.
    ///
    /// An existing entry keeps its `id` and `first_seen_at`.
    async fn upsert_entry(&self, collection: &str, entry: &CatalogEntry) -> StoreResult<()>;

    /// Delete by key. Returns whether an entry was removed.
    async fn delete_entry(&self, collection: &str, key: &IdentityKey) -> StoreResult<bool>;
}

/// Append-only price observations.
#[async_trait]
pub trait PriceHistoryStore: Send + Sync {
    /// Append one observation. Never overwrites.
    async fn append_price(&self, entry: &PriceHistoryEntry) -> StoreResult<()>;

    /// History for one product, oldest first.
    async fn history_for(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Vec<PriceHistoryEntry>>;

    /// Total number of history records.
    async fn count_history(&self) -> StoreResult<u64>;
}

/// Composite storage trait used by the synchronizer.
pub trait Catalog: CatalogStore + PriceHistoryStore {}

// Blanket implementation: anything implementing both traits is a Catalog
impl<T: CatalogStore + PriceHistoryStore> Catalog for T {}
