// GET handlers: version, live gauges, seconds tier, minute tier

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use crate::models::{AggregatedRecord, GaugeReading, MetricSample, MetricType};

/// Row cap for ranged minute-tier queries without an explicit limit.
const DEFAULT_RANGE_LIMIT: u32 = 10_080;
const MAX_RANGE_LIMIT: u32 = 100_000;

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/gauges: latest live reading per metric type.
pub(super) async fn gauges_handler(State(state): State<AppState>) -> Json<Vec<GaugeReading>> {
    Json(state.gauges.all_latest())
}

/// GET /api/usage/seconds: unconsumed seconds-tier samples, oldest first.
pub(super) async fn seconds_handler(State(state): State<AppState>) -> Json<Vec<MetricSample>> {
    Json(state.buffer.get_all())
}

#[derive(Debug, Deserialize)]
pub(super) struct RangeQuery {
    from: Option<i64>,
    to: Option<i64>,
    limit: Option<u32>,
}

/// GET /api/usage/minutes: full minute-tier history, or [from, to) when a bound is given.
pub(super) async fn minutes_handler(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<AggregatedRecord>>, ApiError> {
    if q.from.is_none() && q.to.is_none() && q.limit.is_none() {
        return Ok(Json(state.store.fetch_all().await?));
    }
    let from = q.from.unwrap_or(i64::MIN);
    let to = q.to.unwrap_or(i64::MAX);
    if from >= to {
        return Err(ApiError::BadRequest(format!(
            "empty range: from ({}) must be before to ({})",
            from, to
        )));
    }
    let limit = q.limit.unwrap_or(DEFAULT_RANGE_LIMIT).min(MAX_RANGE_LIMIT);
    Ok(Json(state.store.fetch_range(from, to, limit).await?))
}

/// GET /api/usage/latest/{metric_type}: most recent minute record, `null` if none yet.
pub(super) async fn latest_handler(
    State(state): State<AppState>,
    Path(metric_type): Path<String>,
) -> Result<Json<Option<AggregatedRecord>>, ApiError> {
    let metric_type: MetricType = metric_type.parse()?;
    Ok(Json(state.store.fetch_latest(metric_type).await?))
}
