//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use telemetry::{health, metrics};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = health().report();

    Json(HealthResponse {
        status: report.status.as_str().to_string(),
        components: report.components,
        queue_depth: metrics().queue_depth.get(),
        live_workers: metrics().live_workers.get(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /health/ready - Items can be accepted and batches can leave.
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    if health().is_ready() && !state.queue.is_closed() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    StatusCode::OK
}
