// Live gauge readings handed to the display consumer.

use serde::{Deserialize, Serialize};

use super::{MetricSample, MetricType};

/// Start of the warning zone (percent).
pub const WARNING_THRESHOLD: f64 = 60.0;
/// Start of the danger zone (percent).
pub const DANGER_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeZone {
    Normal,
    Warning,
    Danger,
}

impl GaugeZone {
    pub fn for_value(value: f64) -> Self {
        if value >= DANGER_THRESHOLD {
            GaugeZone::Danger
        } else if value >= WARNING_THRESHOLD {
            GaugeZone::Warning
        } else {
            GaugeZone::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeReading {
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: i64,
    pub zone: GaugeZone,
}

impl From<MetricSample> for GaugeReading {
    fn from(sample: MetricSample) -> Self {
        Self {
            metric_type: sample.metric_type,
            value: sample.value,
            timestamp: sample.timestamp,
            zone: GaugeZone::for_value(sample.value),
        }
    }
}
