// Host metric acquisition: CPU busy %, memory usage % and memory pressure %.
// Reads run on the blocking pool; the only state kept is the previous CPU tick snapshot.

mod procfs;

pub use procfs::ProcHost;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tracing::instrument;

use crate::models::MetricType;

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("host counter read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed host counters: {0}")]
    Parse(String),
    #[error("host metrics are not supported on {0}")]
    Unsupported(&'static str),
    #[error("sampling task join: {0}")]
    Join(String),
}

/// Cumulative CPU tick counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

/// Virtual memory page counts. Bytes = count * page_size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStats {
    pub active: u64,
    pub inactive: u64,
    pub wired: u64,
    pub compressed: u64,
    pub page_size: u64,
}

/// Platform query for raw counters. Implementations may block.
pub trait HostCounters: Send + Sync + 'static {
    fn cpu_ticks(&self) -> Result<CpuTicks, AcquisitionError>;
    fn vm_stats(&self) -> Result<VmStats, AcquisitionError>;
    /// Total physical memory in bytes; 0 if unknown.
    fn physical_memory(&self) -> u64;
}

/// Which memory figure feeds the memory gauge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Wired + compressed only.
    #[default]
    Pressure,
    /// Active + inactive + wired + compressed.
    Usage,
}

pub struct MetricSource<H: HostCounters = ProcHost> {
    host: Arc<H>,
    previous_cpu: Arc<Mutex<CpuTicks>>,
    memory_mode: MemoryMode,
}

impl MetricSource<ProcHost> {
    pub fn from_host_system(memory_mode: MemoryMode) -> Self {
        Self::new(ProcHost::new(), memory_mode)
    }
}

impl<H: HostCounters> MetricSource<H> {
    pub fn new(host: H, memory_mode: MemoryMode) -> Self {
        Self {
            host: Arc::new(host),
            previous_cpu: Arc::new(Mutex::new(CpuTicks::default())),
            memory_mode,
        }
    }

    pub fn memory_mode(&self) -> MemoryMode {
        self.memory_mode
    }

    /// Samples `metric_type`; 0 on acquisition failure (logged).
    pub async fn sample(&self, metric_type: MetricType) -> f64 {
        or_zero(self.try_sample(metric_type).await, metric_type.as_str())
    }

    pub async fn try_sample(&self, metric_type: MetricType) -> Result<f64, AcquisitionError> {
        match (metric_type, self.memory_mode) {
            (MetricType::Cpu, _) => self.try_sample_cpu().await,
            (MetricType::Memory, MemoryMode::Pressure) => self.try_sample_memory_pressure().await,
            (MetricType::Memory, MemoryMode::Usage) => self.try_sample_memory_usage().await,
        }
    }

    pub async fn sample_cpu(&self) -> f64 {
        or_zero(self.try_sample_cpu().await, "cpu")
    }

    pub async fn sample_memory_usage(&self) -> f64 {
        or_zero(self.try_sample_memory_usage().await, "memory_usage")
    }

    pub async fn sample_memory_pressure(&self) -> f64 {
        or_zero(self.try_sample_memory_pressure().await, "memory_pressure")
    }

    /// CPU busy % since the previous successful read. The baseline moves to the
    /// latest reading on every successful fetch, even when the delta is empty.
    #[instrument(skip(self), fields(source = "host", operation = "sample_cpu"))]
    pub async fn try_sample_cpu(&self) -> Result<f64, AcquisitionError> {
        let host = self.host.clone();
        let previous = self.previous_cpu.clone();
        tokio::task::spawn_blocking(move || {
            // The baseline is a plain copy, so a read that panicked left it intact.
            let mut baseline = previous.lock().unwrap_or_else(PoisonError::into_inner);
            let current = host.cpu_ticks()?;
            let usage = cpu_usage_percent(&baseline, &current);
            *baseline = current;
            Ok(usage)
        })
        .await
        .map_err(|e| AcquisitionError::Join(e.to_string()))?
    }

    #[instrument(skip(self), fields(source = "host", operation = "sample_memory_usage"))]
    pub async fn try_sample_memory_usage(&self) -> Result<f64, AcquisitionError> {
        let host = self.host.clone();
        tokio::task::spawn_blocking(move || {
            let vm = host.vm_stats()?;
            Ok(memory_usage_percent(&vm, host.physical_memory()))
        })
        .await
        .map_err(|e| AcquisitionError::Join(e.to_string()))?
    }

    #[instrument(skip(self), fields(source = "host", operation = "sample_memory_pressure"))]
    pub async fn try_sample_memory_pressure(&self) -> Result<f64, AcquisitionError> {
        let host = self.host.clone();
        tokio::task::spawn_blocking(move || {
            let vm = host.vm_stats()?;
            Ok(memory_pressure_percent(&vm, host.physical_memory()))
        })
        .await
        .map_err(|e| AcquisitionError::Join(e.to_string()))?
    }
}

fn or_zero(result: Result<f64, AcquisitionError>, metric: &str) -> f64 {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, metric, "metric acquisition failed; reporting 0");
        0.0
    })
}

/// `(user + system + nice) / total * 100` over the deltas; 0 when no ticks elapsed.
/// Counters that went backwards contribute 0.
pub fn cpu_usage_percent(previous: &CpuTicks, current: &CpuTicks) -> f64 {
    let user = current.user.saturating_sub(previous.user) as f64;
    let system = current.system.saturating_sub(previous.system) as f64;
    let idle = current.idle.saturating_sub(previous.idle) as f64;
    let nice = current.nice.saturating_sub(previous.nice) as f64;

    let total = user + system + idle + nice;
    if total <= 0.0 {
        return 0.0;
    }
    ((user + system + nice) / total * 100.0).clamp(0.0, 100.0)
}

pub fn memory_usage_percent(vm: &VmStats, physical_memory: u64) -> f64 {
    let pages = vm.active + vm.inactive + vm.wired + vm.compressed;
    percent_of_physical(pages, vm.page_size, physical_memory)
}

pub fn memory_pressure_percent(vm: &VmStats, physical_memory: u64) -> f64 {
    percent_of_physical(vm.wired + vm.compressed, vm.page_size, physical_memory)
}

fn percent_of_physical(pages: u64, page_size: u64, physical_memory: u64) -> f64 {
    if physical_memory == 0 {
        return 0.0;
    }
    let bytes = pages as f64 * page_size as f64;
    bytes / physical_memory as f64 * 100.0
}
