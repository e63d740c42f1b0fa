// In-process record store with the same ordering and append semantics as SqliteStore.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RecordStore, StoreError};
use crate::models::{AggregatedRecord, MetricType, NewRecord, RecordId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    records: Vec<AggregatedRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sorted(mut records: Vec<AggregatedRecord>) -> Vec<AggregatedRecord> {
        records.sort_by_key(|r| (r.timestamp, r.record_id));
        records
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, record: &NewRecord) -> Result<RecordId, StoreError> {
        let mut inner = self.inner();
        inner.next_id += 1;
        let id = RecordId(inner.next_id);
        inner.records.push(AggregatedRecord::from_new(id, record));
        Ok(id)
    }

    async fn fetch_all(&self) -> Result<Vec<AggregatedRecord>, StoreError> {
        Ok(Self::sorted(self.inner().records.clone()))
    }

    async fn fetch_latest(
        &self,
        metric_type: MetricType,
    ) -> Result<Option<AggregatedRecord>, StoreError> {
        Ok(self
            .inner()
            .records
            .iter()
            .filter(|r| r.metric_type == metric_type)
            .max_by_key(|r| (r.timestamp, r.record_id))
            .copied())
    }

    async fn fetch_range(
        &self,
        from_ts: i64,
        to_ts: i64,
        limit: u32,
    ) -> Result<Vec<AggregatedRecord>, StoreError> {
        let in_range = self
            .inner()
            .records
            .iter()
            .filter(|r| r.timestamp >= from_ts && r.timestamp < to_ts)
            .copied()
            .collect();
        let mut out = Self::sorted(in_range);
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn prune_before(&self, cutoff_ts: i64) -> Result<u64, StoreError> {
        let mut inner = self.inner();
        let before = inner.records.len();
        inner.records.retain(|r| r.timestamp >= cutoff_ts);
        Ok((before - inner.records.len()) as u64)
    }

    async fn vacuum(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
