//! Catalog Reconciliation Library
//!
//! Turns raw grocery listings scraped from several stores into one catalog of
//! canonical products, and keeps that catalog in step with each new scrape.
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog_sync::{ListingFeed, MemoryStore, Pipeline, Vocabulary};
//!
//! let vocabulary = Vocabulary::load_dir("vocabulary".as_ref())?;
//! let feed = ListingFeed::from_json_str(&std::fs::read_to_string("products.json")?)?;
//!
//! let pipeline = Pipeline::new(MemoryStore::new(), vocabulary);
//! let report = pipeline.run(&feed).await?;
//! assert!(report.is_success());
//! ```
//!
//! # Modules
//!
//! - [`normalize`] - Product name cleanup
//! - [`vocabulary`] - Ordered attribute dictionaries and lookup
//! - [`weight`] - Weight extraction cascade
//! - [`price`] - Known stores and per-store price parsing
//! - [`pipeline`] - Grouping, synchronization and run orchestration
//! - [`traits`] - Storage abstractions
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore, PostgresStore)
//! - [`testing`] - Fault-injecting store and fixtures

pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod price;
pub mod retry;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod vocabulary;
pub mod weight;

// Re-export core types at crate root
pub use error::{CatalogError, ConfigError, ListingError, StoreError};
pub use normalize::normalize_name;
pub use pipeline::{
    group, group_by_collection, normalize_listing, synchronize, CollectionReport,
    CollectionStatus, Pipeline, RunReport, SyncFailure, SyncReport,
};
pub use price::{normalize_price, Price, Store};
pub use stores::{MemoryStore, PostgresStore, SqliteStore};
pub use traits::store::{Catalog, CatalogStore, PriceHistoryStore};
pub use types::{
    config::{PipelineConfig, RetryPolicy, SyncConfig},
    listing::{ListingFeed, NormalizedListing, RawListing, DEFAULT_SUB_CATEGORY},
    product::{CanonicalProduct, CatalogEntry, IdentityKey, PriceHistoryEntry, StoreObservation},
};
pub use vocabulary::{AttributeDictionary, AttributeEntry, AttributeKind, Vocabulary};
pub use weight::{extract_weight, Weight};
