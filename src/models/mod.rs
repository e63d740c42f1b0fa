// Domain models

mod gauge;
mod metric;
mod record;

pub use gauge::{DANGER_THRESHOLD, GaugeReading, GaugeZone, WARNING_THRESHOLD};
pub use metric::{
    MS_PER_MINUTE, MetricSample, MetricType, UnknownMetricType, minute_bucket, now_ms,
};
pub use record::{AggregatedRecord, NewRecord, RECORD_TYPE, RecordId};
