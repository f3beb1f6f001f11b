use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::types::config::{PipelineConfig, RetryPolicy, SyncConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Only required by commands that touch the store
    pub database_url: Option<String>,
    pub vocabulary_dir: PathBuf,
    pub write_concurrency: usize,
    pub max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = SyncConfig::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            vocabulary_dir: env::var("VOCABULARY_DIR")
                .unwrap_or_else(|_| "vocabulary".to_string())
                .into(),
            write_concurrency: match env::var("SYNC_WRITE_CONCURRENCY") {
                Ok(raw) => raw
                    .parse()
                    .context("SYNC_WRITE_CONCURRENCY must be a valid number")?,
                Err(_) => defaults.write_concurrency,
            },
            max_attempts: match env::var("SYNC_MAX_ATTEMPTS") {
                Ok(raw) => raw
                    .parse()
                    .context("SYNC_MAX_ATTEMPTS must be a valid number")?,
                Err(_) => defaults.retry.max_attempts,
            },
        })
    }

    /// The database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }

    /// Library pipeline settings derived from this configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new().with_sync(
            SyncConfig::new()
                .with_write_concurrency(self.write_concurrency)
                .with_retry(RetryPolicy::default().with_max_attempts(self.max_attempts)),
        )
    }
}
