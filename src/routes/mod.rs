// HTTP + WebSocket routes for the display consumer

mod error;
mod http;
mod ws;

use axum::{Router, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::gauges::GaugeBoard;
use crate::sample_buffer::SampleBuffer;
use crate::store::RecordStore;
use crate::task::TaskHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) gauges: Arc<GaugeBoard>,
    pub(crate) buffer: Arc<SampleBuffer>,
    pub(crate) store: Arc<dyn RecordStore>,
}

pub fn app(
    gauges: Arc<GaugeBoard>,
    buffer: Arc<SampleBuffer>,
    store: Arc<dyn RecordStore>,
) -> Router {
    let state = AppState {
        gauges,
        buffer,
        store,
    };
    Router::new()
        .route("/", get(|| async { "usagemon" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/gauges", get(http::gauges_handler)) // GET /api/gauges
        .route("/api/usage/seconds", get(http::seconds_handler)) // GET /api/usage/seconds
        .route("/api/usage/minutes", get(http::minutes_handler)) // GET /api/usage/minutes
        .route("/api/usage/latest/{metric_type}", get(http::latest_handler)) // GET /api/usage/latest/{metric_type}
        .route("/ws/gauges", get(ws::ws_gauges)) // WS /ws/gauges
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Serves `app` until `shutdown` resolves or the server fails, then stops `tasks`
/// in order. Tasks are stopped on both paths; the server error is returned last.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()>,
    tasks: Vec<TaskHandle>,
) -> std::io::Result<()> {
    let served = tokio::select! {
        result = axum::serve(listener, app) => result,
        _ = shutdown => {
            tracing::info!("Received shutdown signal");
            Ok(())
        }
    };
    if let Err(ref e) = served {
        tracing::error!(error = %e, "server stopped; flushing before exit");
    }

    for task in tasks {
        task.stop().await;
    }
    served
}
