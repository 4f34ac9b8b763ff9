//! Restarts a long-running loop until shutdown.
//!
//! The loop runs in its own task so a panic is observed as a failed join
//! rather than tearing down the caller. An error or a panic restarts the
//! loop immediately; a clean return ends supervision.

use engine_core::Result;
use std::future::Future;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct Supervisor {
    name: String,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, shutdown: CancellationToken) -> Self {
        Self {
            name: name.into(),
            shutdown,
        }
    }

    /// Runs `factory()` until it returns `Ok` or shutdown is observed.
    ///
    /// Returns the number of restarts performed.
    pub async fn run<F, Fut>(&self, mut factory: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut restarts = 0u64;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match tokio::spawn(factory()).await {
                Ok(Ok(())) => {
                    info!(supervised = %self.name, "Loop exited cleanly");
                    break;
                }
                Ok(Err(e)) => {
                    error!(supervised = %self.name, error = %e, "Loop failed");
                }
                Err(join_error) => {
                    error!(supervised = %self.name, error = %join_error, "Loop panicked");
                }
            }

            if self.shutdown.is_cancelled() {
                info!(supervised = %self.name, "Shutdown requested, not restarting");
                break;
            }

            restarts += 1;
            metrics().supervisor_restarts.inc(&self.name);
            warn!(supervised = %self.name, restarts, "Restarting loop");
        }

        restarts
    }

    /// Runs the supervision itself as a background task.
    pub fn spawn<F, Fut>(self, factory: F) -> JoinHandle<u64>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tokio::spawn(async move { self.run(factory).await })
    }
}
