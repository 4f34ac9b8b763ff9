//! Downstream batch collaborators.

use async_trait::async_trait;
use engine_core::{Batch, Error, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Receives sealed batches, one at a time.
///
/// A returned error is logged and counted; the batch is not retried.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn dispatch(&self, batch: &Batch) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Used when no downstream target is configured.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl BatchDispatcher for LogDispatcher {
    async fn dispatch(&self, batch: &Batch) -> Result<()> {
        info!(
            batch_id = %batch.id(),
            items = batch.len(),
            "Batch ready (no dispatch target configured)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// POSTs the batch as JSON; non-2xx responses are failures.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    target: String,
}

impl HttpDispatcher {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            target: target.into(),
        })
    }
}

#[async_trait]
impl BatchDispatcher for HttpDispatcher {
    async fn dispatch(&self, batch: &Batch) -> Result<()> {
        let response = self
            .client
            .post(&self.target)
            .json(batch)
            .send()
            .await
            .map_err(|e| Error::dispatch(batch.id(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::dispatch(batch.id(), format!("status {}", status)));
        }

        debug!(batch_id = %batch.id(), status = %status, "Batch accepted downstream");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
