//! Product types - identity keys, canonical products, and persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::price::Price;
use crate::weight::Weight;

/// The attribute tuple that decides whether two listings are the same product.
///
/// `category` is the listing's sub-category; the main category selects the
/// catalog collection and is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityKey {
    #[serde(rename = "type")]
    pub product_type: String,
    pub weight: Weight,
    pub firm: String,
    pub flavor: String,
    #[serde(rename = "sort")]
    pub variety: String,
    #[serde(rename = "groupName")]
    pub category: String,
}

/// One store's offer for a canonical product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreObservation {
    pub store_name: String,
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<Price>,
    pub image_url: String,
    pub link: String,
}

/// A product merged across every store that sells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProduct {
    #[serde(flatten)]
    pub key: IdentityKey,

    /// Per-store offers in the order the stores were encountered
    pub observations: Vec<StoreObservation>,
}

impl CanonicalProduct {
    pub fn new(key: IdentityKey) -> Self {
        Self {
            key,
            observations: Vec::new(),
        }
    }

    /// The first store that reported this product.
    pub fn primary(&self) -> Option<&StoreObservation> {
        self.observations.first()
    }

    /// Cheapest current price across stores.
    pub fn lowest_price(&self) -> Option<Price> {
        self.observations.iter().map(|o| o.price).min()
    }
}

/// Persisted state of one canonical product inside a category collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Assigned at insert; kept across updates
    pub id: Uuid,

    #[serde(flatten)]
    pub key: IdentityKey,

    /// Image of the first-seen store
    pub image_url: String,

    /// Product page of the first-seen store
    pub link: String,

    pub lowest_price: Price,

    pub store_count: u32,

    /// Set at insert; kept across updates
    pub first_seen_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Project a canonical product onto its persisted form.
    ///
    /// Returns `None` for a product with no observations, which the grouper
    /// never produces.
    pub fn from_product(product: &CanonicalProduct, now: DateTime<Utc>) -> Option<Self> {
        let primary = product.primary()?;
        Some(Self {
            id: Uuid::now_v7(),
            key: product.key.clone(),
            image_url: primary.image_url.clone(),
            link: primary.link.clone(),
            lowest_price: product.lowest_price()?,
            store_count: u32::try_from(product.observations.len()).unwrap_or(u32::MAX),
            first_seen_at: now,
            updated_at: now,
        })
    }
}

/// One timestamped price observation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    /// Catalog collection (main category) the product belongs to
    pub collection: String,

    #[serde(flatten)]
    pub key: IdentityKey,

    pub store_name: String,

    pub observed_at: DateTime<Utc>,

    pub price: Price,
}

impl PriceHistoryEntry {
    pub fn new(
        collection: &str,
        key: &IdentityKey,
        observation: &StoreObservation,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            key: key.clone(),
            store_name: observation.store_name.clone(),
            observed_at,
            price: observation.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> IdentityKey {
        IdentityKey {
            product_type: "Сир".into(),
            weight: Weight::grams(250),
            firm: "Без фірми".into(),
            flavor: "Без вкуса".into(),
            variety: "Без сорта".into(),
            category: "Сир".into(),
        }
    }

    fn observation(store: &str, price: &str) -> StoreObservation {
        StoreObservation {
            store_name: store.into(),
            price: price.parse().unwrap(),
            discount_price: None,
            image_url: format!("https://{store}/img"),
            link: format!("https://{store}/p"),
        }
    }

    #[test]
    fn test_entry_takes_primary_store_and_lowest_price() {
        let mut product = CanonicalProduct::new(key());
        product.observations.push(observation("fozzy", "89.90"));
        product.observations.push(observation("atb", "79.50"));

        let now = Utc::now();
        let entry = CatalogEntry::from_product(&product, now).unwrap();
        assert_eq!(entry.key, product.key);
        assert_eq!(entry.image_url, "https://fozzy/img");
        assert_eq!(entry.lowest_price.to_string(), "79.50");
        assert_eq!(entry.store_count, 2);
        assert_eq!(entry.first_seen_at, now);
    }

    #[test]
    fn test_empty_product_has_no_entry() {
        assert!(CatalogEntry::from_product(&CanonicalProduct::new(key()), Utc::now()).is_none());
    }

    #[test]
    fn test_key_serializes_with_catalog_field_names() {
        let json = serde_json::to_value(key()).unwrap();
        assert_eq!(json["type"], "Сир");
        assert_eq!(json["weight"], "250");
        assert_eq!(json["sort"], "Без сорта");
        assert_eq!(json["groupName"], "Сир");
    }
}
