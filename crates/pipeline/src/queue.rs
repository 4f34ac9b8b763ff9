//! The ingestion queue.
//!
//! An unbounded channel: pushing never blocks and never fails while the
//! aggregator is alive. The receiving half outlives individual consumer
//! loops so a restarted loop resumes where the previous one stopped.

use engine_core::Item;
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::warn;

/// Shared receiving half, locked by whichever consumer loop is running.
pub type QueueReceiver = Arc<Mutex<UnboundedReceiver<Item>>>;

/// Producer handle, cloned into every worker and the ingress layer.
#[derive(Clone)]
pub struct IngestionQueue {
    tx: UnboundedSender<Item>,
}

impl IngestionQueue {
    pub fn new() -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, Arc::new(Mutex::new(rx)))
    }

    /// Hands an item to the aggregator. Ownership moves into the queue.
    pub fn push(&self, item: Item) {
        match self.tx.send(item) {
            Ok(()) => {
                metrics().items_queued.inc();
                metrics().queue_depth.inc();
            }
            Err(_) => {
                warn!("Ingestion queue closed, item discarded");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
