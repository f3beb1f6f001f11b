//! Storage implementations for the catalog.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (tests, dry runs)
//! - `SqliteStore` - SQLite file-based storage
//! - `PostgresStore` - PostgreSQL storage

pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
