// Pipeline counters, logged periodically by the maintenance worker.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    samples_taken: AtomicU64,
    aggregation_passes: AtomicU64,
    records_written: AtomicU64,
    records_lost: AtomicU64,
    records_pruned: AtomicU64,
}

/// Point-in-time copy of `PipelineStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub samples_taken: u64,
    pub aggregation_passes: u64,
    pub records_written: u64,
    pub records_lost: u64,
    pub records_pruned: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&self) {
        self.samples_taken.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pass(&self, written: u64, lost: u64) {
        self.aggregation_passes.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(written, Ordering::Relaxed);
        self.records_lost.fetch_add(lost, Ordering::Relaxed);
    }

    pub fn add_pruned(&self, n: u64) {
        self.records_pruned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_taken: self.samples_taken.load(Ordering::Relaxed),
            aggregation_passes: self.aggregation_passes.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_lost: self.records_lost.load(Ordering::Relaxed),
            records_pruned: self.records_pruned.load(Ordering::Relaxed),
        }
    }
}
