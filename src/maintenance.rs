// Minute-tier upkeep: prune records past retention, VACUUM on a schedule, log pipeline stats.
// VACUUM runs on a configurable schedule (cron expression or fixed interval).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use crate::config::{MonitoringConfig, StoreConfig};
use crate::models::now_ms;
use crate::stats::PipelineStats;
use crate::store::{RecordStore, StoreError};
use crate::task::TaskHandle;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Config for the maintenance worker.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub retention_days: u32,
    pub prune_interval: Duration,
    /// Optional cron expression for VACUUM. Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM at this interval when vacuum_schedule is not set.
    pub vacuum_interval: Duration,
    pub stats_log_interval: Duration,
}

impl MaintenanceConfig {
    pub fn new(store: &StoreConfig, monitoring: &MonitoringConfig) -> Self {
        Self {
            retention_days: store.retention_days,
            prune_interval: Duration::from_secs(store.prune_interval_secs),
            vacuum_schedule: store.vacuum_schedule.clone(),
            vacuum_interval: Duration::from_secs(store.vacuum_interval_secs),
            stats_log_interval: Duration::from_secs(monitoring.stats_log_interval_secs),
        }
    }
}

/// Spawns the maintenance worker.
pub fn spawn(
    store: Arc<dyn RecordStore>,
    stats: Arc<PipelineStats>,
    config: MaintenanceConfig,
) -> TaskHandle {
    TaskHandle::spawn("maintenance", move |shutdown_rx| {
        run(store, stats, config, shutdown_rx)
    })
}

#[instrument(skip_all, fields(retention_days = config.retention_days))]
async fn run(
    store: Arc<dyn RecordStore>,
    stats: Arc<PipelineStats>,
    config: MaintenanceConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut prune_tick = interval(config.prune_interval);
    prune_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_log_tick = interval(config.stats_log_interval);
    stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let (vacuum_tx, mut vacuum_rx) = mpsc::channel::<()>(1);
    let scheduler = tokio::spawn(vacuum_scheduler(config.clone(), vacuum_tx));

    loop {
        tokio::select! {
            _ = prune_tick.tick() => {
                match prune_expired(store.as_ref(), config.retention_days, now_ms()).await {
                    Ok(n) => {
                        stats.add_pruned(n);
                        if n > 0 {
                            info!(records_pruned = n, "expired minute records pruned");
                        } else {
                            debug!(operation = "prune_before", "nothing to prune");
                        }
                    }
                    Err(e) => warn!(error = %e, operation = "prune_before", "Failed to prune old records"),
                }
            }
            Some(()) = vacuum_rx.recv() => {
                if let Err(e) = store.vacuum().await {
                    warn!(error = %e, "vacuum failed");
                } else {
                    info!("vacuum complete");
                }
            }
            _ = stats_log_tick.tick() => {
                let s = stats.snapshot();
                info!(
                    samples_taken = s.samples_taken,
                    aggregation_passes = s.aggregation_passes,
                    records_written = s.records_written,
                    records_lost = s.records_lost,
                    records_pruned = s.records_pruned,
                    "pipeline stats"
                );
            }
            _ = &mut shutdown_rx => {
                debug!("maintenance worker shutting down");
                break;
            }
        }
    }
    scheduler.abort();
}

/// Deletes records older than `retention_days` before `now_ms`.
pub async fn prune_expired(
    store: &dyn RecordStore,
    retention_days: u32,
    now_ms: i64,
) -> Result<u64, StoreError> {
    let cutoff = now_ms - (retention_days as i64) * MS_PER_DAY;
    store.prune_before(cutoff).await
}

/// Sends a message on `tx` at each VACUUM time (cron or fixed interval). Uses local time for cron.
async fn vacuum_scheduler(config: MaintenanceConfig, tx: mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.vacuum_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid vacuum_schedule; VACUUM will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        loop {
            tokio::time::sleep(config.vacuum_interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}
