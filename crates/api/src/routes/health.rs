//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use store::{HealthCheck, Store};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// `up`, or `degraded` when the store cannot be reached.
    pub status: &'static str,
    /// `up` or `down`.
    pub database: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /health: pings the store. Answers 503 while it is unreachable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse),
    )
)]
pub async fn check<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "up", "up"),
        Err(e) => {
            tracing::warn!(error = %e, "store ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down")
        }
    };
    let body = HealthResponse {
        status,
        database,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    };
    (code, Json(body))
}
