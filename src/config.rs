use std::str::FromStr;

use serde::Deserialize;

use crate::metric_source::MemoryMode;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub cpu_interval_ms: u64,
    pub memory_interval_ms: u64,
    /// Figure fed to the memory gauge: "pressure" (default) or "usage".
    #[serde(default)]
    pub memory_mode: MemoryMode,
    /// Max number of gauge readings kept in the broadcast channel for /ws/gauges (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_aggregation_interval_secs")]
    pub interval_secs: u64,
    /// Attempts per record write before the bucket is given up.
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_aggregation_interval_secs(),
            max_write_attempts: default_max_write_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_aggregation_interval_secs() -> u64 {
    60
}

fn default_max_write_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    30
}

fn default_prune_interval_secs() -> u64 {
    3600
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log pipeline stats (samples taken, records written/lost) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.sampling.cpu_interval_ms > 0,
            "sampling.cpu_interval_ms must be > 0, got {}",
            self.sampling.cpu_interval_ms
        );
        anyhow::ensure!(
            self.sampling.memory_interval_ms > 0,
            "sampling.memory_interval_ms must be > 0, got {}",
            self.sampling.memory_interval_ms
        );
        anyhow::ensure!(
            self.sampling.broadcast_capacity > 0,
            "sampling.broadcast_capacity must be > 0, got {}",
            self.sampling.broadcast_capacity
        );
        anyhow::ensure!(
            self.aggregation.interval_secs > 0,
            "aggregation.interval_secs must be > 0, got {}",
            self.aggregation.interval_secs
        );
        anyhow::ensure!(
            self.aggregation.max_write_attempts > 0,
            "aggregation.max_write_attempts must be > 0, got {}",
            self.aggregation.max_write_attempts
        );
        anyhow::ensure!(
            self.store.backend == StoreBackend::Memory || !self.store.path.is_empty(),
            "store.path must be non-empty"
        );
        anyhow::ensure!(
            self.store.retention_days > 0,
            "store.retention_days must be > 0, got {}",
            self.store.retention_days
        );
        anyhow::ensure!(
            self.store.prune_interval_secs > 0,
            "store.prune_interval_secs must be > 0, got {}",
            self.store.prune_interval_secs
        );
        anyhow::ensure!(
            self.store.vacuum_interval_secs > 0,
            "store.vacuum_interval_secs must be > 0, got {}",
            self.store.vacuum_interval_secs
        );
        if let Some(ref schedule) = self.store.vacuum_schedule {
            cron::Schedule::from_str(schedule).map_err(|e| {
                anyhow::anyhow!("store.vacuum_schedule {:?} is not a valid cron expression: {}", schedule, e)
            })?;
        }
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
