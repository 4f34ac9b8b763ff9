//! Bounded retry with quadratic backoff.

use crate::fetcher::RemoteFetcher;
use engine_core::{Error, Result};
use std::time::Duration;
use telemetry::metrics;
use tracing::{info, warn};

/// Retry policy for remote fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, unit: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            unit,
        }
    }

    /// Wait before attempt `i` (0-based): `i² × unit`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt.saturating_mul(attempt))
    }
}

/// Fetches `url`, retrying up to the policy's attempt count.
///
/// Returns the last error once attempts are exhausted.
pub async fn fetch_with_retry(
    fetcher: &dyn RemoteFetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<String> {
    let mut last_error = None;

    for attempt in 0..policy.attempts {
        let delay = policy.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        metrics().config_fetches.inc();
        match fetcher.fetch_text(url).await {
            Ok(body) => {
                if attempt > 0 {
                    info!(url = %url, attempt = attempt + 1, "Remote fetch recovered");
                }
                return Ok(body);
            }
            Err(e) => {
                metrics().config_fetch_failures.inc();
                warn!(
                    url = %url,
                    attempt = attempt + 1,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Remote fetch failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::config_fetch(url, "no attempt made")))
}
