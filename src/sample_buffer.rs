// Seconds tier: one slot per metric type, latest wins. No sub-minute history is kept.
// Producers (poll loops) and the aggregation pass share it through the internal mutex.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{MetricSample, MetricType};

#[derive(Debug, Default)]
pub struct SampleBuffer {
    slots: Mutex<HashMap<MetricType, MetricSample>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the slot for `metric_type`. An unconsumed earlier sample is dropped.
    pub fn put(&self, metric_type: MetricType, value: f64, timestamp: i64) {
        let sample = MetricSample::new(metric_type, value, timestamp);
        if let Some(previous) = self.slots().insert(metric_type, sample) {
            tracing::trace!(
                metric_type = %metric_type,
                overwritten_timestamp = previous.timestamp,
                "seconds sample overwritten before aggregation"
            );
        }
    }

    /// Consistent snapshot, ascending by timestamp.
    pub fn get_all(&self) -> Vec<MetricSample> {
        let mut out: Vec<MetricSample> = self.slots().values().copied().collect();
        out.sort_by_key(|s| (s.timestamp, s.metric_type));
        out
    }

    pub fn get(&self, metric_type: MetricType) -> Option<MetricSample> {
        self.slots().get(&metric_type).copied()
    }

    pub fn remove_all(&self, types: &[MetricType]) {
        let mut slots = self.slots();
        for t in types {
            slots.remove(t);
        }
    }

    /// Removes each slot only if it still holds exactly the given sample, so a
    /// sample written after the caller's snapshot survives. Returns the number removed.
    pub fn remove_consumed(&self, samples: &[MetricSample]) -> usize {
        let mut slots = self.slots();
        let mut removed = 0;
        for s in samples {
            if slots.get(&s.metric_type) == Some(s) {
                slots.remove(&s.metric_type);
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    // Slot writes are single inserts/removes, so a poisoned map is still consistent.
    fn slots(&self) -> MutexGuard<'_, HashMap<MetricType, MetricSample>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
