//! Remote configuration health checks.

use crate::resolver::ConfigResolver;
use telemetry::health;
use tracing::{debug, error};

/// Check that the sources endpoint answers, and record the result.
pub async fn check_connection(resolver: &ConfigResolver) -> bool {
    match resolver.probe().await {
        Ok(()) => {
            debug!("Remote configuration reachable");
            health().remote_config.set_healthy();
            true
        }
        Err(e) => {
            error!("Remote configuration health check failed: {}", e);
            health().remote_config.set_unhealthy(e.to_string());
            false
        }
    }
}
