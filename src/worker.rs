// Poll loops: one per metric type. Each tick samples the host, stores the value in the
// seconds tier and republishes it to the gauge board.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::Instrument;

use crate::gauges::GaugeBoard;
use crate::metric_source::{HostCounters, MetricSource};
use crate::models::{GaugeReading, MetricSample, MetricType, now_ms};
use crate::sample_buffer::SampleBuffer;
use crate::stats::PipelineStats;
use crate::task::TaskHandle;

/// Rate limit for "no receivers" log (avoid logging every second when no one is on /ws/gauges)
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Shared collaborators of the poll loops.
pub struct PollDeps<H: HostCounters> {
    pub source: Arc<MetricSource<H>>,
    pub buffer: Arc<SampleBuffer>,
    pub gauges: Arc<GaugeBoard>,
    pub stats: Arc<PipelineStats>,
}

impl<H: HostCounters> Clone for PollDeps<H> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            buffer: self.buffer.clone(),
            gauges: self.gauges.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Samples once, stores into the seconds tier and publishes.
/// Returns the reading and whether any streaming client received it.
pub async fn poll_once<H: HostCounters>(
    metric_type: MetricType,
    deps: &PollDeps<H>,
) -> (GaugeReading, bool) {
    let value = deps.source.sample(metric_type).await;
    let sample = MetricSample::new(metric_type, value, now_ms());
    deps.buffer.put(sample.metric_type, sample.value, sample.timestamp);
    deps.stats.add_sample();

    let reading = GaugeReading::from(sample);
    let delivered = deps.gauges.publish(reading);
    (reading, delivered)
}

/// Spawns the poll loop for `metric_type`, ticking every `period`.
pub fn spawn_poll_loop<H: HostCounters>(
    metric_type: MetricType,
    period: Duration,
    deps: PollDeps<H>,
) -> TaskHandle {
    let name = match metric_type {
        MetricType::Cpu => "poll_cpu",
        MetricType::Memory => "poll_memory",
    };
    let span = tracing::debug_span!(
        "poll_loop",
        metric_type = %metric_type,
        period_ms = period.as_millis() as u64
    );
    TaskHandle::spawn(name, move |shutdown_rx| {
        run(metric_type, period, deps, shutdown_rx).instrument(span)
    })
}

async fn run<H: HostCounters>(
    metric_type: MetricType,
    period: Duration,
    deps: PollDeps<H>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_no_receivers_log: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let (reading, delivered) = poll_once(metric_type, &deps).await;
                if !delivered {
                    let should_log = last_no_receivers_log
                        .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                    if should_log {
                        tracing::debug!(
                            operation = "broadcast_reading",
                            value = reading.value,
                            "No active gauge stream clients; broadcast channel has no receivers"
                        );
                        last_no_receivers_log = Some(Instant::now());
                    }
                }
            }
            _ = &mut shutdown_rx => {
                tracing::debug!("Poll loop shutting down");
                break;
            }
        }
    }
}
