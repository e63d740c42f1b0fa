// Pure aggregation: fold seconds samples into per-(type, minute) means.
// Store access and buffer clearing live in aggregation_worker.

use std::collections::BTreeMap;

use crate::models::{MetricSample, MetricType, NewRecord};

/// One record per (metric type, minute bucket), ordered by bucket then type.
/// Every group is folded; samples for different buckets of one type are not dropped.
pub fn aggregate_samples(samples: &[MetricSample]) -> Vec<NewRecord> {
    let mut buckets: BTreeMap<(i64, MetricType), Vec<f64>> = BTreeMap::new();
    for s in samples {
        buckets
            .entry((s.bucket(), s.metric_type))
            .or_default()
            .push(s.value);
    }

    buckets
        .into_iter()
        .map(|((timestamp, metric_type), values)| NewRecord {
            metric_type,
            value: mean_f64(&values),
            timestamp,
        })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
