//! Merge normalized listings into canonical products.

use indexmap::IndexMap;

use crate::types::listing::NormalizedListing;
use crate::types::product::{CanonicalProduct, IdentityKey};

/// Canonical products of one catalog collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionGroup {
    /// Collection name (the listings' main category)
    pub collection: String,

    /// Number of listings folded into `products`
    pub listing_count: usize,

    pub products: Vec<CanonicalProduct>,
}

/// Group listings by identity key.
///
/// The first listing with a key creates its product; every listing appends
/// one observation. Products and observations keep encounter order.
pub fn group<'a, I>(listings: I) -> Vec<CanonicalProduct>
where
    I: IntoIterator<Item = &'a NormalizedListing>,
{
    let mut products: IndexMap<IdentityKey, CanonicalProduct> = IndexMap::new();
    for listing in listings {
        products
            .entry(listing.identity_key())
            .or_insert_with_key(|key| CanonicalProduct::new(key.clone()))
            .observations
            .push(listing.observation());
    }
    products.into_values().collect()
}

/// Split listings by main category and group each collection independently.
///
/// Collections come back in first-encounter order.
pub fn group_by_collection<'a, I>(listings: I) -> Vec<CollectionGroup>
where
    I: IntoIterator<Item = &'a NormalizedListing>,
{
    let mut by_collection: IndexMap<&str, Vec<&NormalizedListing>> = IndexMap::new();
    for listing in listings {
        by_collection
            .entry(listing.main_category.as_str())
            .or_default()
            .push(listing);
    }

    by_collection
        .into_iter()
        .map(|(collection, listings)| CollectionGroup {
            collection: collection.to_string(),
            listing_count: listings.len(),
            products: group(listings),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::Weight;

    fn listing(main: &str, product_type: &str, store: &str, price: &str) -> NormalizedListing {
        NormalizedListing {
            product_name: format!("{product_type} 250г"),
            store_name: store.into(),
            image_url: format!("https://{store}/img"),
            link: format!("https://{store}/p"),
            main_category: main.into(),
            sub_category: product_type.into(),
            product_type: product_type.into(),
            firm: "Без фірми".into(),
            flavor: "Без вкуса".into(),
            variety: "Без сорта".into(),
            weight: Weight::grams(250),
            price: price.parse().unwrap(),
            discount_price: None,
        }
    }

    #[test]
    fn test_same_key_from_two_stores_merges() {
        let listings = vec![
            listing("Молочні", "Сир", "FOZZY", "89.90"),
            listing("Молочні", "Сир", "АТБ", "84.00"),
        ];

        let products = group(&listings);
        assert_eq!(products.len(), 1);
        let stores: Vec<_> = products[0]
            .observations
            .iter()
            .map(|o| o.store_name.as_str())
            .collect();
        assert_eq!(stores, vec!["FOZZY", "АТБ"]);
    }

    #[test]
    fn test_differing_weight_splits_products() {
        let mut heavier = listing("Молочні", "Сир", "FOZZY", "150.00");
        heavier.weight = Weight::grams(500);
        let listings = vec![listing("Молочні", "Сир", "FOZZY", "89.90"), heavier];

        assert_eq!(group(&listings).len(), 2);
    }

    #[test]
    fn test_collections_keep_first_encounter_order() {
        let listings = vec![
            listing("Напої", "Кава", "FOZZY", "200.00"),
            listing("Молочні", "Сир", "FOZZY", "89.90"),
            listing("Напої", "Чай", "FOZZY", "50.00"),
        ];

        let groups = group_by_collection(&listings);
        let names: Vec<_> = groups.iter().map(|g| g.collection.as_str()).collect();
        assert_eq!(names, vec!["Напої", "Молочні"]);
        assert_eq!(groups[0].products.len(), 2);
        assert_eq!(groups[0].listing_count, 2);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(group(std::iter::empty()).is_empty());
        assert!(group_by_collection(std::iter::empty()).is_empty());
    }
}
