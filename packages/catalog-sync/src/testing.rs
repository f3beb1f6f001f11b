//! Testing utilities: a fault-injecting store wrapper and fixture builders.
//!
//! These are useful for exercising retry and failure isolation without a
//! real database.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;

use crate::error::{StoreError, StoreResult};
use crate::retry::unavailable;
use crate::traits::store::{CatalogStore, PriceHistoryStore};
use crate::types::listing::RawListing;
use crate::types::product::{CatalogEntry, IdentityKey, PriceHistoryEntry};
use crate::vocabulary::{AttributeDictionary, AttributeEntry, AttributeKind, Vocabulary};
use crate::weight::Weight;

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Fetch,
    Find,
    Upsert,
    Delete,
    Append,
    History,
}

/// Wraps a store and injects failures.
///
/// Transient failures are consumed one per call, so a budget of 2 on
/// [`StoreOp::Upsert`] fails the next two upserts and lets the third through.
/// Collections marked with [`FlakyStore::fail_collection`] fail permanently.
pub struct FlakyStore<S> {
    inner: S,
    transient: RwLock<IndexMap<StoreOp, u32>>,
    broken_collections: RwLock<HashSet<String>>,
    calls: RwLock<IndexMap<StoreOp, u32>>,
    injected: AtomicU32,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            transient: RwLock::new(IndexMap::new()),
            broken_collections: RwLock::new(HashSet::new()),
            calls: RwLock::new(IndexMap::new()),
            injected: AtomicU32::new(0),
        }
    }

    /// Fail the next `count` calls of `op` with a transient error.
    pub fn with_transient_failures(self, op: StoreOp, count: u32) -> Self {
        self.transient.write().unwrap().insert(op, count);
        self
    }

    /// Fail every call touching `collection` with a permanent error.
    pub fn fail_collection(self, collection: impl Into<String>) -> Self {
        self.broken_collections.write().unwrap().insert(collection.into());
        self
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of calls made for `op`, including failed ones.
    pub fn calls(&self, op: StoreOp) -> u32 {
        self.calls.read().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    fn check(&self, op: StoreOp, collection: &str) -> StoreResult<()> {
        *self.calls.write().unwrap().entry(op).or_insert(0) += 1;

        if self.broken_collections.read().unwrap().contains(collection) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Rejected(
                format!("collection {collection} is read-only").into(),
            ));
        }

        let mut transient = self.transient.write().unwrap();
        if let Some(remaining) = transient.get_mut(&op).filter(|n| **n > 0) {
            *remaining -= 1;
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: CatalogStore> CatalogStore for FlakyStore<S> {
    async fn fetch_collection(&self, collection: &str) -> StoreResult<Vec<CatalogEntry>> {
        self.check(StoreOp::Fetch, collection)?;
        self.inner.fetch_collection(collection).await
    }

    async fn find_entry(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Option<CatalogEntry>> {
        self.check(StoreOp::Find, collection)?;
        self.inner.find_entry(collection, key).await
    }

    async fn upsert_entry(&self, collection: &str, entry: &CatalogEntry) -> StoreResult<()> {
        self.check(StoreOp::Upsert, collection)?;
        self.inner.upsert_entry(collection, entry).await
    }

    async fn delete_entry(&self, collection: &str, key: &IdentityKey) -> StoreResult<bool> {
        self.check(StoreOp::Delete, collection)?;
        self.inner.delete_entry(collection, key).await
    }
}

#[async_trait]
impl<S: PriceHistoryStore> PriceHistoryStore for FlakyStore<S> {
    async fn append_price(&self, entry: &PriceHistoryEntry) -> StoreResult<()> {
        self.check(StoreOp::Append, &entry.collection)?;
        self.inner.append_price(entry).await
    }

    async fn history_for(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Vec<PriceHistoryEntry>> {
        self.check(StoreOp::History, collection)?;
        self.inner.history_for(collection, key).await
    }

    async fn count_history(&self) -> StoreResult<u64> {
        self.inner.count_history().await
    }
}

/// An identity key with sentinel firm, flavor and variety.
pub fn identity_key(product_type: &str, grams: u32) -> IdentityKey {
    IdentityKey {
        product_type: product_type.to_string(),
        weight: Weight::grams(grams),
        firm: AttributeKind::Firm.sentinel().to_string(),
        flavor: AttributeKind::Flavor.sentinel().to_string(),
        variety: AttributeKind::Variety.sentinel().to_string(),
        category: product_type.to_string(),
    }
}

/// A single-store catalog entry stamped now.
pub fn catalog_entry(key: IdentityKey, price: &str) -> CatalogEntry {
    let now = Utc::now();
    CatalogEntry {
        id: uuid::Uuid::now_v7(),
        key,
        image_url: "https://img.example/1.png".to_string(),
        link: "https://shop.example/p/1".to_string(),
        lowest_price: price.parse().unwrap(),
        store_count: 1,
        first_seen_at: now,
        updated_at: now,
    }
}

/// A complete raw listing with placeholder image and link.
pub fn raw_listing(product_name: &str, store_name: &str, price: &str) -> RawListing {
    let slug = product_name.len();
    RawListing::new(product_name, store_name, price)
        .with_image_url(format!("https://img.example/{store_name}/{slug}.png"))
        .with_link(format!("https://shop.example/{store_name}/{slug}"))
}

/// A small dairy vocabulary covering the `Сир` and `Молоко` categories.
pub fn dairy_vocabulary() -> Vocabulary {
    let mut vocabulary = Vocabulary::default();

    let mut add = |kind: AttributeKind, category: &str, name: &str, variants: &[&str]| {
        let dictionary: &mut AttributeDictionary = vocabulary.dictionary_mut(kind);
        dictionary
            .push(category, AttributeEntry::new(name, variants.iter().copied()))
            .unwrap();
    };

    add(AttributeKind::Type, "Сир", "Сир", &["сир"]);
    add(AttributeKind::Type, "Молоко", "Молоко", &["молоко"]);
    add(AttributeKind::Firm, "Сир", "Президент", &["президент", "president"]);
    add(AttributeKind::Firm, "Молоко", "Галичина", &["галичина"]);
    add(AttributeKind::Flavor, "Молоко", "Шоколад", &["шоколад"]);
    add(AttributeKind::Variety, "Сир", "Твердий", &["твердий"]);
    add(AttributeKind::Variety, "Сир", "Плавлений", &["плавлений"]);

    vocabulary
}
