//! Pipeline configuration.

use engine_core::limits::{DEFAULT_BATCH_SIZE, DEFAULT_DISPATCH_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batching and dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Items per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Hard timeout on one downstream dispatch
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
    /// Downstream collaborator URL; batches are only logged when absent
    #[serde(default)]
    pub dispatch_target: Option<String>,
    /// Run dispatch calls on their own thread and runtime
    #[serde(default = "default_dedicated_dispatch_thread")]
    pub dedicated_dispatch_thread: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_dispatch_timeout_secs() -> u64 {
    DEFAULT_DISPATCH_TIMEOUT.as_secs()
}

fn default_dedicated_dispatch_thread() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            dispatch_target: None,
            dedicated_dispatch_thread: default_dedicated_dispatch_thread(),
        }
    }
}

impl PipelineConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}
