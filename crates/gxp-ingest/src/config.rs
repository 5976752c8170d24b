//! Ingestion configuration
//!
//! All knobs come from `INGEST_*` environment variables with defaults
//! suitable for local development.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of records per bulk-insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 250_000;

/// Default number of concurrent workers per process.
pub const DEFAULT_WORKERS: usize = 2;

/// Default idle delay between queue polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default wall-clock budget for a single job, in seconds.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 3600;

/// Default timeout for a single remote I/O call, in seconds.
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 300;

/// Worker/pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records accumulated before a batch is committed
    pub batch_size: usize,
    /// Concurrent workers in this process
    pub workers: usize,
    /// Idle delay between queue polls
    pub poll_interval_secs: u64,
    /// Wall-clock budget for one job; exceeded jobs are marked failed
    pub job_timeout_secs: u64,
    /// Budget for a single remote I/O call (object open, registry query)
    pub io_timeout_secs: u64,
    /// Database URL for the broker and the job sessions
    pub database_url: String,
}

impl IngestConfig {
    /// Load from environment, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            batch_size: env_parsed("INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            workers: env_parsed("INGEST_WORKERS", DEFAULT_WORKERS),
            poll_interval_secs: env_parsed("INGEST_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            job_timeout_secs: env_parsed("INGEST_JOB_TIMEOUT_SECS", DEFAULT_JOB_TIMEOUT_SECS),
            io_timeout_secs: env_parsed("INGEST_IO_TIMEOUT_SECS", DEFAULT_IO_TIMEOUT_SECS),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/gxp".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("INGEST_BATCH_SIZE must be greater than 0");
        }
        if self.workers == 0 {
            anyhow::bail!("INGEST_WORKERS must be greater than 0");
        }
        if self.job_timeout_secs == 0 {
            anyhow::bail!("INGEST_JOB_TIMEOUT_SECS must be greater than 0");
        }
        if self.io_timeout_secs == 0 {
            anyhow::bail!("INGEST_IO_TIMEOUT_SECS must be greater than 0");
        }
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL cannot be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
            database_url: "postgresql://localhost/gxp".to_string(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.batch_size, 250_000);
        assert_eq!(config.workers, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = IngestConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = IngestConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_durations() {
        let config = IngestConfig {
            job_timeout_secs: 120,
            io_timeout_secs: 30,
            ..Default::default()
        };
        assert_eq!(config.job_timeout(), Duration::from_secs(120));
        assert_eq!(config.io_timeout(), Duration::from_secs(30));
    }
}
