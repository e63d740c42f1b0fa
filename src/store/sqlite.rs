// SQLite record store. One row per aggregated (type, minute) record; id is store-assigned.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::instrument;

use super::{RecordStore, StoreError};
use crate::models::{AggregatedRecord, MetricType, NewRecord, RECORD_TYPE, RecordId};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    /// Creates the `usage_record` table ("UsageRecord" records) and indexes if not present.
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_record (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                usage REAL NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_record_type_timestamp ON usage_record(type, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_record_timestamp ON usage_record(timestamp)",
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!(record_type = RECORD_TYPE, table = "usage_record", "schema ready");
        Ok(())
    }

    fn parse_row(row: &SqliteRow) -> Result<AggregatedRecord, StoreError> {
        let id: i64 = row.try_get("id")?;
        let type_raw: String = row.try_get("type")?;
        let usage: f64 = row.try_get("usage")?;
        let timestamp: i64 = row.try_get("timestamp")?;
        let metric_type = MetricType::from_str(&type_raw).map_err(|e| StoreError::InvalidRecord {
            record_id: id,
            message: e.to_string(),
        })?;
        Ok(AggregatedRecord {
            record_id: RecordId(id),
            metric_type,
            value: usage,
            timestamp,
        })
    }

    /// Any unreadable row fails the whole query.
    fn parse_rows(rows: &[SqliteRow]) -> Result<Vec<AggregatedRecord>, StoreError> {
        rows.iter().map(Self::parse_row).collect()
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    #[instrument(skip(self, record), fields(store = "sqlite", operation = "save", metric_type = %record.metric_type, timestamp = record.timestamp))]
    async fn save(&self, record: &NewRecord) -> Result<RecordId, StoreError> {
        let r = sqlx::query("INSERT INTO usage_record (type, usage, timestamp) VALUES ($1, $2, $3)")
            .bind(record.metric_type.as_str())
            .bind(record.value)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(RecordId(r.last_insert_rowid()))
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "fetch_all"))]
    async fn fetch_all(&self) -> Result<Vec<AggregatedRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, type, usage, timestamp FROM usage_record ORDER BY timestamp ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Self::parse_rows(&rows)
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "fetch_latest"))]
    async fn fetch_latest(
        &self,
        metric_type: MetricType,
    ) -> Result<Option<AggregatedRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, type, usage, timestamp FROM usage_record
             WHERE type = $1 ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(metric_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "fetch_range"))]
    async fn fetch_range(
        &self,
        from_ts: i64,
        to_ts: i64,
        limit: u32,
    ) -> Result<Vec<AggregatedRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, type, usage, timestamp FROM usage_record
             WHERE timestamp >= $1 AND timestamp < $2
             ORDER BY timestamp ASC, id ASC LIMIT $3",
        )
        .bind(from_ts)
        .bind(to_ts)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Self::parse_rows(&rows)
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "prune_before"))]
    async fn prune_before(&self, cutoff_ts: i64) -> Result<u64, StoreError> {
        let r = sqlx::query("DELETE FROM usage_record WHERE timestamp < $1")
            .bind(cutoff_ts)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    #[instrument(skip(self), fields(store = "sqlite", operation = "vacuum"))]
    async fn vacuum(&self) -> Result<(), StoreError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}
