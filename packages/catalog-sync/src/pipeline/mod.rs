//! The catalog pipeline.
//!
//! Listings flow through three stages:
//! - Normalization (name cleanup, attribute, weight and price extraction)
//! - Grouping into canonical products per collection
//! - Synchronization against the persisted catalog

pub mod group;
pub mod run;
pub mod sync;

pub use group::{group, group_by_collection, CollectionGroup};
pub use run::{
    normalize_listing, CollectionBatch, CollectionReport, CollectionStatus, ListingFailure,
    Pipeline, RunReport,
};
pub use sync::{synchronize, SyncFailure, SyncReport};
