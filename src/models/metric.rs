// Metric types and per-second samples (seconds tier)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: i64 = 60_000;

/// Closed set of sampled metrics. Used as a map key throughout the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Cpu,
    Memory,
}

impl MetricType {
    pub const ALL: [MetricType; 2] = [MetricType::Cpu, MetricType::Memory];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Cpu => "cpu",
            MetricType::Memory => "memory",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric type: {0:?}")]
pub struct UnknownMetricType(pub String);

impl FromStr for MetricType {
    type Err = UnknownMetricType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(MetricType::Cpu),
            "memory" => Ok(MetricType::Memory),
            other => Err(UnknownMetricType(other.to_string())),
        }
    }
}

/// One raw reading. Only the latest per type is kept; see `SampleBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub metric_type: MetricType,
    /// Percentage in [0, 100].
    pub value: f64,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl MetricSample {
    pub fn new(metric_type: MetricType, value: f64, timestamp: i64) -> Self {
        Self {
            metric_type,
            value,
            timestamp,
        }
    }

    pub fn bucket(&self) -> i64 {
        minute_bucket(self.timestamp)
    }
}

/// Start of the minute containing `timestamp_ms` (seconds truncated to 0).
pub fn minute_bucket(timestamp_ms: i64) -> i64 {
    timestamp_ms - timestamp_ms.rem_euclid(MS_PER_MINUTE)
}

/// Wall clock as Unix epoch milliseconds; 0 (with a warning) if the clock is before the epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
