//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Local runs against a scratch catalog
//! - Single-machine deployments
//! - Testing with persistent data
//!
//! Weights, prices and ids are stored as their canonical text forms and
//! timestamps as RFC3339, so a stored key compares equal to the key that
//! produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{CatalogStore, PriceHistoryStore};
use crate::types::product::{CatalogEntry, IdentityKey, PriceHistoryEntry};

/// SQLite-based catalog store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./catalog.db?mode=rwc` - File-based, create if missing
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        Self::connect(database_url, 5).await
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Uses a single connection: every in-memory connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_entries (
                collection TEXT NOT NULL,
                product_type TEXT NOT NULL,
                weight TEXT NOT NULL,
                firm TEXT NOT NULL,
                flavor TEXT NOT NULL,
                variety TEXT NOT NULL,
                category TEXT NOT NULL,
                id TEXT NOT NULL,
                image_url TEXT NOT NULL,
                link TEXT NOT NULL,
                lowest_price TEXT NOT NULL,
                store_count INTEGER NOT NULL,
                first_seen_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, product_type, weight, firm, flavor, variety, category)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                product_type TEXT NOT NULL,
                weight TEXT NOT NULL,
                firm TEXT NOT NULL,
                flavor TEXT NOT NULL,
                variety TEXT NOT NULL,
                category TEXT NOT NULL,
                store_name TEXT NOT NULL,
                observed_at TEXT NOT NULL,
                price TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_price_history_key
                ON price_history(collection, product_type, weight, firm, flavor, variety, category)
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite catalog schema ready");
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct EntryRow {
    product_type: String,
    weight: String,
    firm: String,
    flavor: String,
    variety: String,
    category: String,
    id: String,
    image_url: String,
    link: String,
    lowest_price: String,
    store_count: i64,
    first_seen_at: String,
    updated_at: String,
}

impl EntryRow {
    fn into_entry(self) -> StoreResult<CatalogEntry> {
        let key = decode_key(
            self.product_type,
            &self.weight,
            self.firm,
            self.flavor,
            self.variety,
            self.category,
        )?;
        Ok(CatalogEntry {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| StoreError::Corrupt(format!("Invalid id {:?}: {}", self.id, e)))?,
            key,
            image_url: self.image_url,
            link: self.link,
            lowest_price: self
                .lowest_price
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{}", e)))?,
            store_count: u32::try_from(self.store_count)
                .map_err(|_| StoreError::Corrupt(format!("Invalid store count: {}", self.store_count)))?,
            first_seen_at: parse_timestamp(&self.first_seen_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    collection: String,
    product_type: String,
    weight: String,
    firm: String,
    flavor: String,
    variety: String,
    category: String,
    store_name: String,
    observed_at: String,
    price: String,
}

impl HistoryRow {
    fn into_history_entry(self) -> StoreResult<PriceHistoryEntry> {
        let key = decode_key(
            self.product_type,
            &self.weight,
            self.firm,
            self.flavor,
            self.variety,
            self.category,
        )?;
        Ok(PriceHistoryEntry {
            collection: self.collection,
            key,
            store_name: self.store_name,
            observed_at: parse_timestamp(&self.observed_at)?,
            price: self
                .price
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{}", e)))?,
        })
    }
}

fn decode_key(
    product_type: String,
    weight: &str,
    firm: String,
    flavor: String,
    variety: String,
    category: String,
) -> StoreResult<IdentityKey> {
    Ok(IdentityKey {
        product_type,
        weight: weight
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{}", e)))?,
        firm,
        flavor,
        variety,
        category,
    })
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("Invalid date {:?}: {}", raw, e)))
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn fetch_collection(&self, collection: &str) -> StoreResult<Vec<CatalogEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT product_type, weight, firm, flavor, variety, category,
                   id, image_url, link, lowest_price, store_count, first_seen_at, updated_at
            FROM catalog_entries
            WHERE collection = ?
            ORDER BY first_seen_at, id
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    async fn find_entry(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Option<CatalogEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(
            r#"
            SELECT product_type, weight, firm, flavor, variety, category,
                   id, image_url, link, lowest_price, store_count, first_seen_at, updated_at
            FROM catalog_entries
            WHERE collection = ? AND product_type = ? AND weight = ? AND firm = ?
              AND flavor = ? AND variety = ? AND category = ?
            "#,
        )
        .bind(collection)
        .bind(&key.product_type)
        .bind(key.weight.to_string())
        .bind(&key.firm)
        .bind(&key.flavor)
        .bind(&key.variety)
        .bind(&key.category)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EntryRow::into_entry).transpose()
    }

    async fn upsert_entry(&self, collection: &str, entry: &CatalogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_entries (
                collection, product_type, weight, firm, flavor, variety, category,
                id, image_url, link, lowest_price, store_count, first_seen_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, product_type, weight, firm, flavor, variety, category)
            DO UPDATE SET
                image_url = excluded.image_url,
                link = excluded.link,
                lowest_price = excluded.lowest_price,
                store_count = excluded.store_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(&entry.key.product_type)
        .bind(entry.key.weight.to_string())
        .bind(&entry.key.firm)
        .bind(&entry.key.flavor)
        .bind(&entry.key.variety)
        .bind(&entry.key.category)
        .bind(entry.id.to_string())
        .bind(&entry.image_url)
        .bind(&entry.link)
        .bind(entry.lowest_price.to_string())
        .bind(i64::from(entry.store_count))
        .bind(entry.first_seen_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_entry(&self, collection: &str, key: &IdentityKey) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM catalog_entries
            WHERE collection = ? AND product_type = ? AND weight = ? AND firm = ?
              AND flavor = ? AND variety = ? AND category = ?
            "#,
        )
        .bind(collection)
        .bind(&key.product_type)
        .bind(key.weight.to_string())
        .bind(&key.firm)
        .bind(&key.flavor)
        .bind(&key.variety)
        .bind(&key.category)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PriceHistoryStore for SqliteStore {
    async fn append_price(&self, entry: &PriceHistoryEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (
                collection, product_type, weight, firm, flavor, variety, category,
                store_name, observed_at, price
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.collection)
        .bind(&entry.key.product_type)
        .bind(entry.key.weight.to_string())
        .bind(&entry.key.firm)
        .bind(&entry.key.flavor)
        .bind(&entry.key.variety)
        .bind(&entry.key.category)
        .bind(&entry.store_name)
        .bind(entry.observed_at.to_rfc3339())
        .bind(entry.price.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history_for(
        &self,
        collection: &str,
        key: &IdentityKey,
    ) -> StoreResult<Vec<PriceHistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT collection, product_type, weight, firm, flavor, variety, category,
                   store_name, observed_at, price
            FROM price_history
            WHERE collection = ? AND product_type = ? AND weight = ? AND firm = ?
              AND flavor = ? AND variety = ? AND category = ?
            ORDER BY seq
            "#,
        )
        .bind(collection)
        .bind(&key.product_type)
        .bind(key.weight.to_string())
        .bind(&key.firm)
        .bind(&key.flavor)
        .bind(&key.variety)
        .bind(&key.category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistoryRow::into_history_entry).collect()
    }

    async fn count_history(&self) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{catalog_entry, identity_key};
    use crate::types::product::StoreObservation;
    use crate::weight::{extract_weight, Weight};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_fractional_weights_survive_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut fractional = identity_key("Дріжджі", 500);
        fractional.weight = Weight::grams(Decimal::new(115, 1));
        let mut from_kilograms = identity_key("Борошно", 500);
        from_kilograms.weight = extract_weight("Борошно 1,5кг").unwrap();

        for key in [&fractional, &from_kilograms] {
            store
                .upsert_entry("Бакалія", &catalog_entry(key.clone(), "19.99"))
                .await
                .unwrap();
        }

        let fetched = store.fetch_collection("Бакалія").await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().any(|entry| entry.key == fractional));
        assert!(fetched.iter().any(|entry| entry.key == from_kilograms));
        assert_eq!(from_kilograms.weight, Weight::grams(1500));

        let found = store
            .find_entry("Бакалія", &fractional)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.key.weight.to_string(), "11.5");
    }

    #[tokio::test]
    async fn test_round_trip_preserves_identity_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut key = identity_key("Кава", 500);
        key.weight = Weight::Units(3);
        key.firm = "Lavazza".into();
        let entry = catalog_entry(key.clone(), "249.00");

        store.upsert_entry("Напої", &entry).await.unwrap();
        let fetched = store.fetch_collection("Напої").await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].key, key);
        assert_eq!(fetched[0].id, entry.id);
        assert_eq!(fetched[0].lowest_price.to_string(), "249.00");
    }

    #[tokio::test]
    async fn test_upsert_keeps_id_and_first_seen() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = catalog_entry(identity_key("Сир", 250), "89.90");
        store.upsert_entry("Молочні", &first).await.unwrap();

        let mut second = catalog_entry(identity_key("Сир", 250), "85.00");
        second.store_count = 3;
        store.upsert_entry("Молочні", &second).await.unwrap();

        let stored = store
            .find_entry("Молочні", &first.key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.store_count, 3);
        assert_eq!(stored.lowest_price.to_string(), "85.00");
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_row_was_removed() {
        let store = SqliteStore::in_memory().await.unwrap();
        let entry = catalog_entry(identity_key("Сир", 250), "89.90");
        store.upsert_entry("Молочні", &entry).await.unwrap();

        assert!(store.delete_entry("Молочні", &entry.key).await.unwrap());
        assert!(!store.delete_entry("Молочні", &entry.key).await.unwrap());
        assert!(store.fetch_collection("Молочні").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_append_only_and_ordered() {
        let store = SqliteStore::in_memory().await.unwrap();
        let key = identity_key("Сир", 250);
        let observation = StoreObservation {
            store_name: "FOZZY".into(),
            price: "89.90".parse().unwrap(),
            discount_price: None,
            image_url: "img".into(),
            link: "link".into(),
        };

        let earlier = Utc::now() - chrono::Duration::hours(1);
        store
            .append_price(&PriceHistoryEntry::new("Молочні", &key, &observation, earlier))
            .await
            .unwrap();
        store
            .append_price(&PriceHistoryEntry::new("Молочні", &key, &observation, Utc::now()))
            .await
            .unwrap();

        let history = store.history_for("Молочні", &key).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].observed_at < history[1].observed_at);
        assert_eq!(store.count_history().await.unwrap(), 2);
        assert!(store.history_for("Інше", &key).await.unwrap().is_empty());
    }
}
