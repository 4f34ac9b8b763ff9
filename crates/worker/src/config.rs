//! Worker pool configuration.

use engine_core::limits::{DEFAULT_PULL_PAUSE, DEFAULT_PULL_TIMEOUT, DEFAULT_RECONCILE_INTERVAL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Periodic reconciliation tick
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,
    /// Bounded wait on one pull from a source
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,
    /// Pause before each pull
    #[serde(default = "default_pull_pause_secs")]
    pub pull_pause_secs: u64,
    /// Source ids to schedule; empty means every registered source
    #[serde(default)]
    pub enabled: Vec<String>,
}

fn default_reconcile_interval_ms() -> u64 {
    DEFAULT_RECONCILE_INTERVAL.as_millis() as u64
}

fn default_pull_timeout_secs() -> u64 {
    DEFAULT_PULL_TIMEOUT.as_secs()
}

fn default_pull_pause_secs() -> u64 {
    DEFAULT_PULL_PAUSE.as_secs()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: default_reconcile_interval_ms(),
            pull_timeout_secs: default_pull_timeout_secs(),
            pull_pause_secs: default_pull_pause_secs(),
            enabled: Vec::new(),
        }
    }
}

impl WorkerConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms.max(1))
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn pull_pause(&self) -> Duration {
        Duration::from_secs(self.pull_pause_secs)
    }
}
