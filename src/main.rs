use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use usagemon::*;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let store = store::open(&app_config.store).await?;
    let buffer = Arc::new(sample_buffer::SampleBuffer::new());
    let gauges = Arc::new(gauges::GaugeBoard::new(
        app_config.sampling.broadcast_capacity,
    ));
    let stats = Arc::new(stats::PipelineStats::new());
    let source = Arc::new(metric_source::MetricSource::from_host_system(
        app_config.sampling.memory_mode,
    ));

    let poll_deps = worker::PollDeps {
        source,
        buffer: buffer.clone(),
        gauges: gauges.clone(),
        stats: stats.clone(),
    };
    let cpu_poll = worker::spawn_poll_loop(
        models::MetricType::Cpu,
        Duration::from_millis(app_config.sampling.cpu_interval_ms),
        poll_deps.clone(),
    );
    let memory_poll = worker::spawn_poll_loop(
        models::MetricType::Memory,
        Duration::from_millis(app_config.sampling.memory_interval_ms),
        poll_deps,
    );
    let aggregation = aggregation_worker::spawn(
        aggregation_worker::AggregationDeps {
            buffer: buffer.clone(),
            store: store.clone(),
            stats: stats.clone(),
        },
        aggregation_worker::AggregationWorkerConfig::from(&app_config.aggregation),
    );
    let maintenance = maintenance::spawn(
        store.clone(),
        stats,
        maintenance::MaintenanceConfig::new(&app_config.store, &app_config.monitoring),
    );

    let app = routes::app(gauges, buffer, store);
    tracing::info!("Listening on http://{}", addr);

    // Producers first, so the final aggregation pass sees their last samples.
    routes::serve(
        listener,
        app,
        shutdown_signal(),
        vec![cpu_poll, memory_poll, aggregation, maintenance],
    )
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
