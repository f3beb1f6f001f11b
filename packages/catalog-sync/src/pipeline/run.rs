//! Run orchestration: normalize a feed, group per collection, synchronize.

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ListingError, Result};
use crate::normalize::normalize_name;
use crate::pipeline::group::group;
use crate::pipeline::sync::{synchronize, SyncReport};
use crate::price::Store;
use crate::traits::store::Catalog;
use crate::types::config::PipelineConfig;
use crate::types::listing::{ListingFeed, NormalizedListing, RawListing};
use crate::vocabulary::Vocabulary;
use crate::weight::{extract_weight, Weight};

/// Turn one raw listing into its normalized form.
///
/// Validation happens first, so a listing with a missing field never reaches
/// the dictionaries. Attribute and weight lookups run on the cleaned name.
pub fn normalize_listing(
    raw: &RawListing,
    vocabulary: &Vocabulary,
) -> std::result::Result<NormalizedListing, ListingError> {
    raw.validate()?;

    let store: Store = raw.store_name.parse()?;
    let price = store.parse_price(&raw.price)?;
    let discount_price = raw
        .discount_price
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| store.parse_price(d))
        .transpose()?;

    let product_name = normalize_name(&raw.product_name);
    let category = raw.category();
    let attributes = vocabulary.extract_all(&product_name, category);
    let weight = Weight::or_default(extract_weight(&product_name));

    Ok(NormalizedListing {
        store_name: store.to_string(),
        image_url: raw.image_url.clone(),
        link: raw.link.clone(),
        main_category: raw.main_category.clone(),
        sub_category: category.to_string(),
        product_type: attributes.product_type,
        firm: attributes.firm,
        flavor: attributes.flavor,
        variety: attributes.variety,
        weight,
        price,
        discount_price,
        product_name,
    })
}

/// A listing that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFailure {
    pub main_category: String,
    pub product_name: String,
    pub store_name: String,
    pub reason: String,
}

/// Normalized listings and skipped listings of one collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionBatch {
    pub listings: Vec<NormalizedListing>,
    pub failures: Vec<ListingFailure>,
}

impl CollectionBatch {
    pub fn total(&self) -> usize {
        self.listings.len() + self.failures.len()
    }
}

/// How a collection's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Every write succeeded
    Synchronized,
    /// No listing survived normalization; persisted state was left alone
    Skipped,
    /// A store error stopped synchronization
    Failed,
}

/// Per-collection outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    pub status: CollectionStatus,

    /// Listings read from the feed
    pub listings_total: usize,

    /// Listings skipped as malformed
    pub failed: usize,

    /// Canonical products after grouping
    pub products: usize,

    pub sync: SyncReport,

    /// Store error that stopped synchronization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub collections: Vec<CollectionReport>,
}

impl RunReport {
    /// True when no collection failed to synchronize.
    ///
    /// Skipped listings do not make a run unsuccessful.
    pub fn is_success(&self) -> bool {
        self.collections
            .iter()
            .all(|c| c.status != CollectionStatus::Failed)
    }

    pub fn failed_collections(&self) -> impl Iterator<Item = &CollectionReport> {
        self.collections
            .iter()
            .filter(|c| c.status == CollectionStatus::Failed)
    }

    /// Total listings skipped across collections.
    pub fn listings_failed(&self) -> usize {
        self.collections.iter().map(|c| c.failed).sum()
    }
}

/// The full pipeline bound to a store and a loaded vocabulary.
pub struct Pipeline<S> {
    store: S,
    vocabulary: Vocabulary,
    config: PipelineConfig,
}

impl<S: Catalog> Pipeline<S> {
    pub fn new(store: S, vocabulary: Vocabulary) -> Self {
        Self {
            store,
            vocabulary,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Normalize every listing, bucketed by collection in feed order.
    pub fn normalize(&self, feed: &ListingFeed) -> IndexMap<String, CollectionBatch> {
        let mut batches: IndexMap<String, CollectionBatch> = IndexMap::new();
        for raw in feed.listings() {
            let batch = batches.entry(raw.main_category.clone()).or_default();
            match normalize_listing(&raw, &self.vocabulary) {
                Ok(listing) => batch.listings.push(listing),
                Err(e) => {
                    warn!(
                        collection = raw.main_category.as_str(),
                        store = raw.store_name.as_str(),
                        product = raw.product_name.as_str(),
                        error = %e,
                        "Skipping malformed listing"
                    );
                    batch.failures.push(ListingFailure {
                        main_category: raw.main_category.clone(),
                        product_name: raw.product_name.clone(),
                        store_name: raw.store_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        batches
    }

    /// Normalize, group and synchronize a feed.
    ///
    /// Collections run concurrently and independently; one collection's
    /// store failure is reported and never stops the others.
    pub async fn run(&self, feed: &ListingFeed) -> Result<RunReport> {
        self.config.validate()?;

        let batches = self.normalize(feed);
        info!(
            "Normalized {} listings into {} collections",
            feed.len(),
            batches.len()
        );

        let collections: Vec<CollectionReport> = stream::iter(batches)
            .map(|(collection, batch)| self.sync_collection(collection, batch))
            .buffered(self.config.collection_concurrency)
            .collect()
            .await;

        let report = RunReport { collections };
        info!(
            "Run complete: {} collections, {} failed, {} listings skipped",
            report.collections.len(),
            report.failed_collections().count(),
            report.listings_failed()
        );
        Ok(report)
    }

    async fn sync_collection(&self, collection: String, batch: CollectionBatch) -> CollectionReport {
        let products = group(&batch.listings);
        let mut report = CollectionReport {
            status: CollectionStatus::Skipped,
            listings_total: batch.total(),
            failed: batch.failures.len(),
            products: products.len(),
            sync: SyncReport::new(collection.as_str()),
            error: None,
            collection,
        };

        if products.is_empty() {
            warn!(
                collection = report.collection.as_str(),
                failed = report.failed,
                "No valid listings, leaving collection untouched"
            );
            return report;
        }

        match synchronize(&report.collection, &products, &self.store, &self.config.sync).await {
            Ok(sync) => {
                report.status = CollectionStatus::Synchronized;
                report.sync = sync;
            }
            Err(failure) => {
                warn!(
                    collection = report.collection.as_str(),
                    error = %failure.error,
                    "Collection failed to synchronize"
                );
                report.status = CollectionStatus::Failed;
                report.error = Some(failure.error.to_string());
                report.sync = failure.report;
            }
        }
        report
    }
}
