//! Reconcile one collection's canonical products with persisted state.
//!
//! Flow:
//! 1. Fetch the collection snapshot (retried)
//! 2. Upsert every product, classified insert/update by snapshot membership (retried)
//! 3. Append one price-history record per observation (not retried)
//! 4. Delete snapshot entries whose key is no longer present (retried)
//!
//! Once any write fails no new writes are started; writes already in flight
//! run to completion and are counted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::retry::with_retry;
use crate::traits::store::Catalog;
use crate::types::config::SyncConfig;
use crate::types::product::{CanonicalProduct, CatalogEntry, IdentityKey, PriceHistoryEntry};

/// Write counts for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub collection: String,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub history_appended: usize,
}

impl SyncReport {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Entries inserted or updated.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// A collection whose synchronization stopped on a store error.
///
/// `report` holds the writes that completed before the failure.
#[derive(Debug, Error)]
#[error("synchronizing collection {:?} failed: {error}", .report.collection)]
pub struct SyncFailure {
    pub report: SyncReport,
    #[source]
    pub error: StoreError,
}

#[derive(Default)]
struct ProductOutcome {
    /// `Some(true)` for an update, `Some(false)` for an insert
    upserted: Option<bool>,
    appended: usize,
    error: Option<StoreError>,
}

/// Synchronize `products` into `collection`.
///
/// Products without observations are dropped with a warning and count as
/// absent, so a persisted entry with the same key is deleted.
pub async fn synchronize<S>(
    collection: &str,
    products: &[CanonicalProduct],
    store: &S,
    config: &SyncConfig,
) -> Result<SyncReport, SyncFailure>
where
    S: Catalog + ?Sized,
{
    let mut report = SyncReport::new(collection);
    let concurrency = config.write_concurrency.max(1);

    let products: Vec<&CanonicalProduct> = products
        .iter()
        .filter(|product| {
            let observed = !product.observations.is_empty();
            if !observed {
                warn!(
                    collection,
                    product_type = product.key.product_type.as_str(),
                    weight = %product.key.weight,
                    "Dropping product without store observations"
                );
            }
            observed
        })
        .collect();

    let snapshot = match with_retry(&config.retry, "fetch_collection", || {
        store.fetch_collection(collection)
    })
    .await
    {
        Ok(snapshot) => snapshot,
        Err(error) => return Err(SyncFailure { report, error }),
    };

    debug!(
        collection,
        persisted = snapshot.len(),
        incoming = products.len(),
        "Synchronizing collection"
    );

    let now = Utc::now();
    let abort = AtomicBool::new(false);
    let existing: HashSet<&IdentityKey> = snapshot.iter().map(|entry| &entry.key).collect();

    let outcomes: Vec<ProductOutcome> = stream::iter(products.iter().copied())
        .map(|product| write_product(collection, product, store, config, &existing, &abort, now))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut first_error = None;
    for outcome in outcomes {
        match outcome.upserted {
            Some(true) => report.updated += 1,
            Some(false) => report.inserted += 1,
            None => {}
        }
        report.history_appended += outcome.appended;
        if first_error.is_none() {
            first_error = outcome.error;
        }
    }
    if let Some(error) = first_error {
        warn!(collection, error = %error, "Collection write failed, skipping deletes");
        return Err(SyncFailure { report, error });
    }

    let incoming: HashSet<&IdentityKey> = products.iter().map(|product| &product.key).collect();
    let stale: Vec<&CatalogEntry> = snapshot
        .iter()
        .filter(|entry| !incoming.contains(&entry.key))
        .collect();

    let deletions: Vec<Result<bool, StoreError>> = stream::iter(stale)
        .map(|entry| delete_stale(collection, entry, store, config, &abort))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut first_error = None;
    for deletion in deletions {
        match deletion {
            Ok(true) => report.deleted += 1,
            Ok(false) => {}
            Err(error) if first_error.is_none() => first_error = Some(error),
            Err(_) => {}
        }
    }
    if let Some(error) = first_error {
        warn!(collection, error = %error, "Collection delete failed");
        return Err(SyncFailure { report, error });
    }

    info!(
        "Synchronized {}: {} inserted, {} updated, {} deleted, {} price records",
        collection, report.inserted, report.updated, report.deleted, report.history_appended
    );
    Ok(report)
}

async fn write_product<S>(
    collection: &str,
    product: &CanonicalProduct,
    store: &S,
    config: &SyncConfig,
    existing: &HashSet<&IdentityKey>,
    abort: &AtomicBool,
    now: DateTime<Utc>,
) -> ProductOutcome
where
    S: Catalog + ?Sized,
{
    let mut outcome = ProductOutcome::default();
    if abort.load(Ordering::SeqCst) {
        return outcome;
    }
    let Some(entry) = CatalogEntry::from_product(product, now) else {
        return outcome;
    };

    let is_update = existing.contains(&entry.key);
    if let Err(error) = with_retry(&config.retry, "upsert_entry", || {
        store.upsert_entry(collection, &entry)
    })
    .await
    {
        abort.store(true, Ordering::SeqCst);
        outcome.error = Some(error);
        return outcome;
    }
    outcome.upserted = Some(is_update);
    debug!(
        collection,
        product_type = entry.key.product_type.as_str(),
        weight = %entry.key.weight,
        is_update,
        "Catalog entry written"
    );

    // Appends are not idempotent, so a failure here is never retried.
    for observation in &product.observations {
        let history = PriceHistoryEntry::new(collection, &product.key, observation, now);
        if let Err(error) = store.append_price(&history).await {
            abort.store(true, Ordering::SeqCst);
            outcome.error = Some(error);
            return outcome;
        }
        outcome.appended += 1;
    }
    outcome
}

async fn delete_stale<S>(
    collection: &str,
    entry: &CatalogEntry,
    store: &S,
    config: &SyncConfig,
    abort: &AtomicBool,
) -> Result<bool, StoreError>
where
    S: Catalog + ?Sized,
{
    if abort.load(Ordering::SeqCst) {
        return Ok(false);
    }
    let result = with_retry(&config.retry, "delete_entry", || {
        store.delete_entry(collection, &entry.key)
    })
    .await;

    match &result {
        Ok(_) => debug!(
            collection,
            product_type = entry.key.product_type.as_str(),
            "Stale catalog entry deleted"
        ),
        Err(_) => abort.store(true, Ordering::SeqCst),
    }
    result
}
