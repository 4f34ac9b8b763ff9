//! Application state shared across handlers.

use chrono::{DateTime, Utc};
use pipeline::IngestionQueue;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Where accepted items go
    pub queue: IngestionQueue,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(queue: IngestionQueue) -> Self {
        Self {
            queue,
            started_at: Utc::now(),
        }
    }
}
