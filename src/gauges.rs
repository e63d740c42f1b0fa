// Live gauge board: latest reading per metric type plus a broadcast feed for streaming clients.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::models::{GaugeReading, MetricType};

pub struct GaugeBoard {
    latest: RwLock<HashMap<MetricType, GaugeReading>>,
    tx: broadcast::Sender<GaugeReading>,
}

impl GaugeBoard {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            latest: RwLock::new(HashMap::new()),
            tx,
        }
    }

    /// Stores `reading` as the latest for its type and broadcasts it.
    /// Returns false when no streaming client is subscribed.
    pub fn publish(&self, reading: GaugeReading) -> bool {
        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reading.metric_type, reading);
        self.tx.send(reading).is_ok()
    }

    pub fn latest(&self, metric_type: MetricType) -> Option<GaugeReading> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&metric_type)
            .copied()
    }

    /// Latest reading of every type that has been sampled, in `MetricType` order.
    pub fn all_latest(&self) -> Vec<GaugeReading> {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        MetricType::ALL
            .iter()
            .filter_map(|t| latest.get(t).copied())
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GaugeReading> {
        self.tx.subscribe()
    }
}
