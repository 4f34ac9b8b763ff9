//! Item ingress.
//!
//! Accepts a single item object or an array of items. Each malformed item
//! is rejected on its own; the valid ones are queued. A request where every
//! item is malformed is a 4xx.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use engine_core::{error::ValidationErrorCode, limits::MAX_PAYLOAD_SIZE_BYTES, ParsedItems};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::response::{ApiError, IngestResponse};
use crate::state::AppState;

/// POST /items
pub async fn push_items_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let start = Instant::now();

    if body.len() > MAX_PAYLOAD_SIZE_BYTES {
        let code = ValidationErrorCode::ItemTooLarge;
        return Err(ApiError::validation(
            StatusCode::PAYLOAD_TOO_LARGE,
            code.code(),
            vec![format!(
                "Payload size {}KB exceeds {}KB limit",
                body.len() / 1024,
                MAX_PAYLOAD_SIZE_BYTES / 1024
            )],
        ));
    }

    debug!(payload_size = body.len(), "Received items");

    let parsed = ParsedItems::parse(&body).map_err(|e| {
        warn!(error = %e, "Rejected unparseable payload");
        metrics().items_rejected.inc();
        ApiError::from(e)
    })?;

    let accepted = parsed.items.len();
    let rejected = parsed.rejected.len();
    metrics().items_received.inc_by((accepted + rejected) as u64);

    if rejected > 0 {
        metrics().items_rejected.inc_by(rejected as u64);
        warn!(accepted, rejected, "Some items failed validation");
    }

    if accepted == 0 {
        if let Some(first) = parsed.rejected.first() {
            let status = StatusCode::from_u16(first.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
            let code = first
                .error_code()
                .unwrap_or(ValidationErrorCode::InvalidFormat.code());
            let details = parsed.rejected.iter().map(|e| e.to_string()).collect();
            return Err(ApiError::validation(status, code, details));
        }
    }

    for item in parsed.items {
        state.queue.push(item);
    }

    info!(
        accepted,
        rejected,
        latency_ms = start.elapsed().as_millis() as u64,
        "Items queued"
    );

    if rejected > 0 {
        let errors = parsed.rejected.iter().map(|e| e.to_string()).collect();
        Ok(Json(IngestResponse::partial(accepted, errors)))
    } else {
        Ok(Json(IngestResponse::success(accepted)))
    }
}
