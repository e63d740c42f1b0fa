// Background worker: fold the seconds tier into per-minute records every interval_secs.
// Samples stay buffered until their record is acknowledged or its retries run out.
// On stop, one final pass flushes whatever is still buffered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::aggregation::aggregate_samples;
use crate::config::AggregationConfig;
use crate::models::{NewRecord, RecordId};
use crate::sample_buffer::SampleBuffer;
use crate::stats::PipelineStats;
use crate::store::{RecordStore, StoreError};
use crate::task::TaskHandle;

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Config for the aggregation worker.
#[derive(Debug, Clone)]
pub struct AggregationWorkerConfig {
    pub interval: Duration,
    pub max_write_attempts: u32,
    pub retry_backoff: Duration,
}

impl From<&AggregationConfig> for AggregationWorkerConfig {
    fn from(c: &AggregationConfig) -> Self {
        Self {
            interval: Duration::from_secs(c.interval_secs),
            max_write_attempts: c.max_write_attempts,
            retry_backoff: Duration::from_millis(c.retry_backoff_ms),
        }
    }
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub samples_read: usize,
    pub records_written: usize,
    pub records_failed: usize,
}

/// Shared inputs of the worker.
#[derive(Clone)]
pub struct AggregationDeps {
    pub buffer: Arc<SampleBuffer>,
    pub store: Arc<dyn RecordStore>,
    pub stats: Arc<PipelineStats>,
}

/// Spawns the aggregation worker. The first pass runs one interval after start.
pub fn spawn(deps: AggregationDeps, config: AggregationWorkerConfig) -> TaskHandle {
    TaskHandle::spawn("aggregation", move |shutdown_rx| run(deps, config, shutdown_rx))
}

#[instrument(skip_all, fields(interval_secs = config.interval.as_secs()))]
async fn run(
    deps: AggregationDeps,
    config: AggregationWorkerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut tick = interval_at(Instant::now() + config.interval, config.interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_and_record(&deps, &config).await;
            }
            _ = &mut shutdown_rx => {
                debug!("aggregation worker shutting down; flushing buffered samples");
                run_and_record(&deps, &config).await;
                break;
            }
        }
    }
}

async fn run_and_record(deps: &AggregationDeps, config: &AggregationWorkerConfig) {
    let report = run_one_pass(&deps.buffer, deps.store.as_ref(), config).await;
    if report.samples_read == 0 {
        return;
    }
    deps.stats
        .add_pass(report.records_written as u64, report.records_failed as u64);
    info!(
        samples_read = report.samples_read,
        records_written = report.records_written,
        records_failed = report.records_failed,
        "seconds -> minute aggregation"
    );
}

/// Runs one pass: snapshot, group by (type, minute), write means, clear consumed samples.
/// Consumed samples are cleared even when their write fails after all retries.
pub async fn run_one_pass(
    buffer: &SampleBuffer,
    store: &dyn RecordStore,
    config: &AggregationWorkerConfig,
) -> PassReport {
    let samples = buffer.get_all();
    if samples.is_empty() {
        return PassReport::default();
    }

    let mut report = PassReport {
        samples_read: samples.len(),
        ..PassReport::default()
    };

    for record in aggregate_samples(&samples) {
        match save_with_retry(store, &record, config).await {
            Ok(id) => {
                report.records_written += 1;
                debug!(
                    record_id = id.0,
                    metric_type = %record.metric_type,
                    timestamp = record.timestamp,
                    value = record.value,
                    "minute record saved"
                );
            }
            Err(e) => {
                report.records_failed += 1;
                error!(
                    error = %e,
                    metric_type = %record.metric_type,
                    timestamp = record.timestamp,
                    attempts = config.max_write_attempts,
                    "minute record lost after retries"
                );
            }
        }
    }

    buffer.remove_consumed(&samples);
    report
}

/// Saves with up to `max_write_attempts` attempts and exponential backoff between them.
pub async fn save_with_retry(
    store: &dyn RecordStore,
    record: &NewRecord,
    config: &AggregationWorkerConfig,
) -> Result<RecordId, StoreError> {
    let mut attempt = 0;
    let mut backoff = config.retry_backoff.min(MAX_RETRY_BACKOFF);
    loop {
        attempt += 1;
        match store.save(record).await {
            Ok(id) => return Ok(id),
            Err(e) if attempt >= config.max_write_attempts => return Err(e),
            Err(e) => {
                warn!(
                    error = %e,
                    attempt,
                    retry_in_ms = backoff.as_millis() as u64,
                    operation = "save",
                    "record write failed; retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
            }
        }
    }
}
