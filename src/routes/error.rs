// JSON error responses for the display API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::UnknownMetricType;
use crate::store::StoreError;

#[derive(Debug)]
pub(super) enum ApiError {
    /// The record store could not be read.
    StoreUnavailable(StoreError),
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::StoreUnavailable(e) => {
                tracing::warn!(error = %e, "history query failed");
                (StatusCode::SERVICE_UNAVAILABLE, format!("record store unavailable: {}", e))
            }
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::StoreUnavailable(e)
    }
}

impl From<UnknownMetricType> for ApiError {
    fn from(e: UnknownMetricType) -> Self {
        ApiError::NotFound(e.to_string())
    }
}
