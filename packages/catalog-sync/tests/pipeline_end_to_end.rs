//! End-to-end tests for the catalog pipeline.
//!
//! These tests drive the full flow against a real SQLite database:
//! 1. Load vocabulary files from disk
//! 2. Parse an acquisition feed
//! 3. Normalize, group and synchronize
//! 4. Re-run with a changed feed

use std::fs;

use catalog_sync::{
    normalize_listing, CatalogStore, CollectionStatus, ListingFeed, Pipeline, PriceHistoryStore,
    SqliteStore, Vocabulary, Weight,
};
use tempfile::TempDir;

const DAIRY: &str = "Молочні продукти";

/// Helper to write a vocabulary directory.
fn vocabulary_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        (
            "type.json",
            r#"{"Сир": [{"type": "Сир", "variants": ["сир"]}],
                "Молоко": [{"type": "Молоко", "variants": ["молоко"]}]}"#,
        ),
        (
            "firm.json",
            r#"{"Сир": [{"firm": "Президент", "variants": ["президент", "president"]}]}"#,
        ),
        ("flavor.json", r#"{}"#),
        (
            "variety.json",
            r#"{"Сир": [{"sort": "Твердий", "variants": ["твердий"]}]}"#,
        ),
    ];
    for (name, json) in files {
        fs::write(dir.path().join(name), json).unwrap();
    }
    dir
}

fn listing_json(name: &str, store: &str, price: &str) -> String {
    format!(
        r#"{{"productName": "{name}", "storeName": "{store}", "productImg": "https://img/{store}.png",
            "productLink": "https://{store}/p", "productPrice": "{price}"}}"#
    )
}

fn feed(cheese: &[String], milk: &[String]) -> ListingFeed {
    let json = format!(
        r#"{{"{DAIRY}": {{"Сир": [{}], "Молоко": [{}]}}}}"#,
        cheese.join(","),
        milk.join(",")
    );
    ListingFeed::from_json_str(&json).unwrap()
}

async fn pipeline() -> (Pipeline<SqliteStore>, TempDir) {
    let dir = vocabulary_dir();
    let vocabulary = Vocabulary::load_dir(dir.path()).unwrap();
    let store = SqliteStore::in_memory().await.unwrap();
    (Pipeline::new(store, vocabulary), dir)
}

#[tokio::test]
async fn test_single_listing_end_to_end() {
    let (pipeline, _dir) = pipeline().await;
    let feed = feed(&[listing_json("Сир твердий 250г", "FOZZY", "89,90 грн")], &[]);

    let listing = normalize_listing(&feed.listings().next().unwrap(), pipeline.vocabulary()).unwrap();
    assert_eq!(listing.weight, Weight::grams(250));
    assert_eq!(listing.price.to_string(), "89.90");
    assert_eq!(listing.product_type, "Сир");
    assert_eq!(listing.variety, "Твердий");

    let report = pipeline.run(&feed).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.collections[0].status, CollectionStatus::Synchronized);
    assert_eq!(report.collections[0].sync.inserted, 1);

    let entries = pipeline.store().fetch_collection(DAIRY).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, listing.identity_key());
    assert_eq!(entries[0].key.weight.to_string(), "250");
    assert_eq!(entries[0].lowest_price.to_string(), "89.90");
}

#[tokio::test]
async fn test_same_product_from_two_stores_is_one_entry() {
    let (pipeline, _dir) = pipeline().await;
    let feed = feed(
        &[
            listing_json("Сир твердий Президент 250г", "FOZZY", "89,90 грн"),
            listing_json("Сир  твердий President 250 г", "АТБ", "84.50"),
        ],
        &[],
    );

    let report = pipeline.run(&feed).await.unwrap();
    assert_eq!(report.collections[0].products, 1);
    assert_eq!(report.collections[0].sync.history_appended, 2);

    let entries = pipeline.store().fetch_collection(DAIRY).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key.firm, "Президент");
    assert_eq!(entries[0].store_count, 2);
    assert_eq!(entries[0].lowest_price.to_string(), "84.50");
    assert_eq!(entries[0].image_url, "https://img/FOZZY.png");

    let history = pipeline
        .store()
        .history_for(DAIRY, &entries[0].key)
        .await
        .unwrap();
    let stores: Vec<_> = history.iter().map(|h| h.store_name.as_str()).collect();
    assert_eq!(stores, vec!["FOZZY", "АТБ"]);
}

#[tokio::test]
async fn test_kilogram_and_gram_spellings_share_a_stored_key() {
    let (pipeline, _dir) = pipeline().await;
    let feed = feed(
        &[
            listing_json("Сир твердий 1,5кг", "FOZZY", "540,00 грн"),
            listing_json("Сир твердий 1500г", "АТБ", "525.00"),
            listing_json("Сир твердий 11,5г", "АТБ", "9.00"),
        ],
        &[],
    );

    pipeline.run(&feed).await.unwrap();

    let entries = pipeline.store().fetch_collection(DAIRY).await.unwrap();
    assert_eq!(entries.len(), 2);
    let kilo = entries
        .iter()
        .find(|e| e.key.weight == Weight::grams(1500))
        .unwrap();
    assert_eq!(kilo.store_count, 2);
    assert_eq!(kilo.key.weight.to_string(), "1500");
    assert!(entries.iter().any(|e| e.key.weight.to_string() == "11.5"));
}

#[tokio::test]
async fn test_resync_updates_inserts_and_deletes() {
    let (pipeline, _dir) = pipeline().await;
    let first = feed(
        &[listing_json("Сир твердий 250г", "FOZZY", "89,90 грн")],
        &[listing_json("Молоко 2.5% 900г", "FOZZY", "42,00 грн")],
    );
    pipeline.run(&first).await.unwrap();
    let original = pipeline.store().fetch_collection(DAIRY).await.unwrap();

    let second = feed(
        &[
            listing_json("Сир твердий 250г", "FOZZY", "79,90 грн"),
            listing_json("Сир твердий 500г", "FOZZY", "150,00 грн"),
        ],
        &[],
    );
    let report = pipeline.run(&second).await.unwrap();
    let sync = &report.collections[0].sync;
    assert_eq!((sync.inserted, sync.updated, sync.deleted), (1, 1, 1));

    let entries = pipeline.store().fetch_collection(DAIRY).await.unwrap();
    assert_eq!(entries.len(), 2);
    let kept = entries
        .iter()
        .find(|e| e.key.weight == Weight::grams(250))
        .unwrap();
    let before = original
        .iter()
        .find(|e| e.key.weight == Weight::grams(250))
        .unwrap();
    assert_eq!(kept.id, before.id);
    assert_eq!(kept.lowest_price.to_string(), "79.90");

    // History is append-only: 2 from the first run, 2 from the second
    assert_eq!(pipeline.store().count_history().await.unwrap(), 4);
}

#[tokio::test]
async fn test_malformed_listing_is_skipped_not_fatal() {
    let (pipeline, _dir) = pipeline().await;
    let feed = feed(
        &[
            listing_json("Сир твердий 250г", "FOZZY", "89,90 грн"),
            listing_json("Сир плавлений 90г", "Невідомий", "30"),
        ],
        &[],
    );

    let report = pipeline.run(&feed).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.collections[0].failed, 1);
    assert_eq!(report.listings_failed(), 1);
    assert_eq!(pipeline.store().fetch_collection(DAIRY).await.unwrap().len(), 1);
}
