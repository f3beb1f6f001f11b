//! Core trait abstractions for the catalog pipeline.
//!
//! Applications implement these to plug in a persisted store.

pub mod store;
