// Shared test helpers
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use usagemon::metric_source::{AcquisitionError, CpuTicks, HostCounters, VmStats};
use usagemon::models::{AggregatedRecord, MetricType, NewRecord, RecordId};
use usagemon::store::{MemoryStore, RecordStore, StoreError};

pub const TEST_CONFIG: &str = r#"
[server]
port = 8090
host = "127.0.0.1"

[sampling]
cpu_interval_ms = 1000
memory_interval_ms = 1000
broadcast_capacity = 16

[aggregation]
interval_secs = 60
max_write_attempts = 3
retry_backoff_ms = 1

[store]
path = "data/test.db"
retention_days = 30

[monitoring]
stats_log_interval_secs = 60
"#;

/// Unix epoch ms for 2025-01-01 10:00:00 UTC.
pub const TEN_AM: i64 = 1_735_725_600_000;

pub fn at(minutes: i64, seconds: i64) -> i64 {
    TEN_AM + minutes * 60_000 + seconds * 1_000
}

/// Host with scripted tick readings. `None` entries (or an empty script) fail the read.
pub struct FakeHost {
    ticks: Mutex<VecDeque<Option<CpuTicks>>>,
    vm: Option<VmStats>,
    physical_memory: u64,
}

impl FakeHost {
    pub fn new(ticks: Vec<Option<CpuTicks>>, vm: Option<VmStats>, physical_memory: u64) -> Self {
        Self {
            ticks: Mutex::new(ticks.into()),
            vm,
            physical_memory,
        }
    }

    pub fn with_ticks(ticks: Vec<Option<CpuTicks>>) -> Self {
        Self::new(ticks, None, 0)
    }

    pub fn with_memory(vm: VmStats, physical_memory: u64) -> Self {
        Self::new(vec![], Some(vm), physical_memory)
    }

    /// Busy ticks grow by 25 and idle by 75 per read: 25 % CPU.
    pub fn steady(reads: u64) -> Self {
        let script = (0..=reads)
            .map(|i| Some(ticks(25 * i, 0, 75 * i, 0)))
            .collect();
        let vm = VmStats {
            active: 400,
            inactive: 100,
            wired: 150,
            compressed: 50,
            page_size: 1024,
        };
        Self::new(script, Some(vm), 1000 * 1024)
    }
}

impl HostCounters for FakeHost {
    fn cpu_ticks(&self) -> Result<CpuTicks, AcquisitionError> {
        self.ticks
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .ok_or_else(|| AcquisitionError::Parse("scripted cpu failure".into()))
    }

    fn vm_stats(&self) -> Result<VmStats, AcquisitionError> {
        self.vm
            .ok_or_else(|| AcquisitionError::Parse("scripted vm failure".into()))
    }

    fn physical_memory(&self) -> u64 {
        self.physical_memory
    }
}

pub fn ticks(user: u64, system: u64, idle: u64, nice: u64) -> CpuTicks {
    CpuTicks {
        user,
        system,
        idle,
        nice,
    }
}

/// MemoryStore that fails the first `save_failures` saves and, optionally, every read.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    save_failures_left: AtomicU32,
    fail_reads: AtomicBool,
    save_attempts: AtomicU32,
}

impl FlakyStore {
    pub fn failing_saves(n: u32) -> Self {
        Self {
            save_failures_left: AtomicU32::new(n),
            ..Self::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn save_attempts(&self) -> u32 {
        self.save_attempts.load(Ordering::SeqCst)
    }

    fn read_guard(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn save(&self, record: &NewRecord) -> Result<RecordId, StoreError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .save_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("scripted write failure".into()));
        }
        self.inner.save(record).await
    }

    async fn fetch_all(&self) -> Result<Vec<AggregatedRecord>, StoreError> {
        self.read_guard()?;
        self.inner.fetch_all().await
    }

    async fn fetch_latest(
        &self,
        metric_type: MetricType,
    ) -> Result<Option<AggregatedRecord>, StoreError> {
        self.read_guard()?;
        self.inner.fetch_latest(metric_type).await
    }

    async fn fetch_range(
        &self,
        from_ts: i64,
        to_ts: i64,
        limit: u32,
    ) -> Result<Vec<AggregatedRecord>, StoreError> {
        self.read_guard()?;
        self.inner.fetch_range(from_ts, to_ts, limit).await
    }

    async fn prune_before(&self, cutoff_ts: i64) -> Result<u64, StoreError> {
        self.inner.prune_before(cutoff_ts).await
    }

    async fn vacuum(&self) -> Result<(), StoreError> {
        self.inner.vacuum().await
    }
}
