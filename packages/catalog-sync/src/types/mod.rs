//! Data types for listings, products, and configuration.

pub mod config;
pub mod listing;
pub mod product;
