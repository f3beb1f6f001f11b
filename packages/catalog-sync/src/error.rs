//! Typed errors for the catalog pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! a bad listing apart from an unreachable store or a broken vocabulary.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-level error.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A listing could not be normalized
    #[error("malformed listing: {0}")]
    MalformedInput(#[from] ListingError),

    /// The persisted store failed
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Vocabulary or pipeline configuration is invalid
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Listing feed could not be decoded
    #[error("listing feed error: {0}")]
    Feed(#[source] serde_json::Error),

    /// Listing feed could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-listing failures. The listing is skipped and counted; the run goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    /// A required field is absent or blank
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    /// `storeName` is not one of the known sources
    #[error("unknown store: {0}")]
    UnknownStore(String),

    /// A feed element is not a listing object
    #[error("undecodable listing: {0}")]
    Undecodable(String),

    /// Price text is not a number after store-specific cleanup
    #[error("unparseable price {raw:?} from {store}")]
    UnparseablePrice { raw: String, store: String },
}

/// Failures reported by a catalog or price-history backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or timed out
    #[error("store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The backend rejected the operation
    #[error("store rejected operation: {0}")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted row could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_) => StoreError::Unavailable(Box::new(err)),
            other => StoreError::Rejected(Box::new(other)),
        }
    }
}

/// Startup failures. Fatal: the pipeline never runs with partial vocabularies.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A vocabulary file is missing or unreadable
    #[error("cannot read vocabulary {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A vocabulary file is not valid JSON of the expected shape
    #[error("invalid vocabulary {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A vocabulary entry is structurally valid JSON but unusable
    #[error("malformed {kind} entry in category {category:?}: {reason}")]
    MalformedEntry {
        kind: &'static str,
        category: String,
        reason: String,
    },

    /// A pipeline setting is out of range
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_transient() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn missing_rows_are_not_transient() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_transient());
    }

    #[test]
    fn listing_errors_convert_into_catalog_errors() {
        let err: CatalogError = ListingError::MissingField { field: "price" }.into();
        assert_eq!(
            err.to_string(),
            "malformed listing: missing required field `price`"
        );
    }
}
