//! Configuration types for synchronization and pipeline runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Bounded exponential backoff for idempotent store calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    ///
    /// Default: 4.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    ///
    /// Default: 200ms.
    pub base_delay_ms: u64,

    /// Upper bound for a single delay.
    ///
    /// Default: 5s.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set base and maximum delays.
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay_ms = base.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Configuration for synchronizing one catalog collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Concurrent writes against independent identity keys.
    ///
    /// Default: 8.
    pub write_concurrency: usize,

    /// Retry policy for fetch, upsert and delete.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_concurrency: 8,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set write concurrency.
    pub fn with_write_concurrency(mut self, concurrency: usize) -> Self {
        self.write_concurrency = concurrency;
        self
    }

    /// Set retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Collections synchronized at the same time.
    ///
    /// Default: 4.
    pub collection_concurrency: usize,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection_concurrency: 4,
            sync: SyncConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set collection concurrency.
    pub fn with_collection_concurrency(mut self, concurrency: usize) -> Self {
        self.collection_concurrency = concurrency;
        self
    }

    /// Set sync config.
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Reject settings that would stall or never attempt a write.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "collection_concurrency",
                reason: "must be at least 1".into(),
            });
        }
        if self.sync.write_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "write_concurrency",
                reason: "must be at least 1".into(),
            });
        }
        if self.sync.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default()
            .with_delays(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = PipelineConfig::new().with_sync(SyncConfig::new().with_write_concurrency(0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { name: "write_concurrency", .. })
        ));
        assert!(PipelineConfig::default().validate().is_ok());
    }
}
