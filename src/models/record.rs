// Aggregated records: one row per (metric type, minute bucket) in the minute tier.

use serde::{Deserialize, Serialize};

use super::MetricType;

/// Record type name used by the durable store.
pub const RECORD_TYPE: &str = "UsageRecord";

/// Store-assigned identifier. Opaque to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

/// A bucket average that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub metric_type: MetricType,
    /// Mean of the samples in the bucket.
    pub value: f64,
    /// Bucket start, Unix epoch milliseconds.
    pub timestamp: i64,
}

/// A persisted bucket average. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub record_id: RecordId,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: i64,
}

impl AggregatedRecord {
    pub fn from_new(record_id: RecordId, record: &NewRecord) -> Self {
        Self {
            record_id,
            metric_type: record.metric_type,
            value: record.value,
            timestamp: record.timestamp,
        }
    }
}
