// Minute tier: durable, append-only store of per-bucket averages.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{AggregatedRecord, MetricType, NewRecord, RecordId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record {record_id}: {message}")]
    InvalidRecord { record_id: i64, message: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Record store contract. Failures are returned, never folded into empty results.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends a record. No upsert: identical (type, timestamp) pairs are stored twice.
    async fn save(&self, record: &NewRecord) -> Result<RecordId, StoreError>;

    /// Every record, ascending by timestamp.
    async fn fetch_all(&self) -> Result<Vec<AggregatedRecord>, StoreError>;

    /// Most recent record for `metric_type`, `None` if there is none.
    async fn fetch_latest(
        &self,
        metric_type: MetricType,
    ) -> Result<Option<AggregatedRecord>, StoreError>;

    /// Records in [from_ts, to_ts), ascending by timestamp, at most `limit`.
    async fn fetch_range(
        &self,
        from_ts: i64,
        to_ts: i64,
        limit: u32,
    ) -> Result<Vec<AggregatedRecord>, StoreError>;

    /// Deletes records with timestamp < cutoff_ts. Returns the number deleted.
    async fn prune_before(&self, cutoff_ts: i64) -> Result<u64, StoreError>;

    /// Reclaims space after deletes. No-op for backends without one.
    async fn vacuum(&self) -> Result<(), StoreError>;
}

/// Opens and initializes the configured backend.
pub async fn open(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::connect(&config.path).await?;
            store.init().await?;
            tracing::info!(path = %config.path, "sqlite record store ready");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory record store; history is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
