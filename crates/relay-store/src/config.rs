//! Store configuration and backend selection.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryJobStore;
use crate::redis_store::RedisJobStore;
use crate::store::JobStore;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map; single instance only.
    Memory,
    /// Shared Redis store; safe across instances.
    Redis,
}

impl std::str::FromStr for StoreBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(StoreError::config_error(format!(
                "Unknown JOB_STORE backend: {}",
                other
            ))),
        }
    }
}

/// Job store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Redis connection URL (redis backend only)
    pub redis_url: String,
    /// Key prefix for redis keys
    pub key_prefix: String,
    /// How long a record is kept after its last write
    pub retention: Duration,
    /// Maximum records held by the memory backend
    pub max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "relay".to_string(),
            retention: Duration::from_secs(7 * 24 * 3600),
            max_entries: 100_000,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            backend: std::env::var("JOB_STORE")
                .unwrap_or_default()
                .parse()?,
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: std::env::var("JOB_STORE_PREFIX").unwrap_or(defaults.key_prefix),
            retention: std::env::var("JOB_RETENTION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention),
            max_entries: std::env::var("JOB_STORE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
        })
    }
}

/// Build the configured store.
pub async fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn JobStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!(
                retention_secs = config.retention.as_secs(),
                max_entries = config.max_entries,
                "Using in-memory job store (single instance only)"
            );
            Ok(Arc::new(MemoryJobStore::new(
                config.retention,
                config.max_entries,
            )))
        }
        StoreBackend::Redis => {
            let store = RedisJobStore::new(&config.redis_url, &config.key_prefix, config.retention)?;
            store.ping().await?;
            info!(
                retention_secs = config.retention.as_secs(),
                "Using Redis job store"
            );
            Ok(Arc::new(store))
        }
    }
}
