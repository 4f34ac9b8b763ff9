//! Single-flight batch aggregator.
//!
//! The consumer loop pulls items off the ingestion queue and seals a batch
//! every `batch_size` items. Sealed batches go to a FIFO buffer. Whoever
//! holds the single-flight permit drains that buffer in order, one dispatch
//! at a time, and only gives the permit back once the buffer is empty.
//!
//! Dispatch is bounded by `dispatch_timeout`. A batch that times out is
//! dropped: it is logged and counted, never retried nor put back.

use crate::batch::BatchAccumulator;
use crate::config::PipelineConfig;
use crate::dispatcher::BatchDispatcher;
use crate::executor::DispatchExecutor;
use crate::queue::QueueReceiver;
use engine_core::{Batch, Error, Item, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome counters for one aggregator instance.
#[derive(Debug, Default)]
pub struct AggregatorStats {
    pub dispatched: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

struct Shared {
    dispatcher: Arc<dyn BatchDispatcher>,
    executor: Arc<DispatchExecutor>,
    timeout: Duration,
    receiver: QueueReceiver,
    accumulator: Mutex<BatchAccumulator>,
    buffer: Mutex<VecDeque<Batch>>,
    slot: Arc<Semaphore>,
    stats: AggregatorStats,
}

/// Consumes the ingestion queue and dispatches batches one at a time.
///
/// Clones share the same buffer, permit and pending items, so a supervisor
/// can restart `run` without losing state.
#[derive(Clone)]
pub struct BatchAggregator {
    shared: Arc<Shared>,
}

impl BatchAggregator {
    pub fn from_config(
        config: &PipelineConfig,
        dispatcher: Arc<dyn BatchDispatcher>,
        executor: Arc<DispatchExecutor>,
        receiver: QueueReceiver,
    ) -> Self {
        Self::new(
            config.batch_size,
            config.dispatch_timeout(),
            dispatcher,
            executor,
            receiver,
        )
    }

    pub fn new(
        batch_size: usize,
        timeout: Duration,
        dispatcher: Arc<dyn BatchDispatcher>,
        executor: Arc<DispatchExecutor>,
        receiver: QueueReceiver,
    ) -> Self {
        info!(
            batch_size,
            timeout_secs = timeout.as_secs_f64(),
            dispatcher = dispatcher.name(),
            dedicated_thread = executor.is_dedicated(),
            "Batch aggregator configured"
        );

        Self {
            shared: Arc::new(Shared {
                dispatcher,
                executor,
                timeout,
                receiver,
                accumulator: Mutex::new(BatchAccumulator::new(batch_size)),
                buffer: Mutex::new(VecDeque::new()),
                slot: Arc::new(Semaphore::new(1)),
                stats: AggregatorStats::default(),
            }),
        }
    }

    /// The consumer loop.
    ///
    /// Returns `Ok` when shutdown is requested or every queue handle is gone.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut rx = self.shared.receiver.lock().await;
        info!("Aggregator consumer loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    let pending = self.pending_items();
                    if pending > 0 {
                        warn!(pending, "Shutting down with an incomplete batch");
                    }
                    info!("Aggregator consumer loop stopped");
                    return Ok(());
                }
                item = rx.recv() => match item {
                    Some(item) => self.accept(item),
                    None => {
                        info!("Ingestion queue closed");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn accept(&self, item: Item) {
        metrics().queue_depth.dec();

        let sealed = {
            let mut acc = self.shared.accumulator.lock();
            let sealed = acc.add(item);
            metrics().pending_items.set(acc.pending_len() as u64);
            sealed
        };

        if let Some(batch) = sealed {
            metrics().batches_formed.inc();
            debug!(batch_id = %batch.id(), items = batch.len(), "Batch sealed");
            self.submit(batch);
        }
    }

    /// Buffers the batch and starts a drain if the slot is free.
    ///
    /// Pushing before trying the permit pairs with the drain's
    /// release-then-recheck, so no batch is left behind in the buffer.
    fn submit(&self, batch: Batch) {
        {
            let mut buffer = self.shared.buffer.lock();
            buffer.push_back(batch);
            metrics().batch_buffer_depth.set(buffer.len() as u64);
        }

        if let Ok(permit) = Arc::clone(&self.shared.slot).try_acquire_owned() {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(drain(shared, permit));
        } else {
            debug!(
                buffered = self.buffered_batches(),
                "Dispatch in flight, batch buffered"
            );
        }
    }

    /// Items received but not yet sealed into a batch.
    pub fn pending_items(&self) -> usize {
        self.shared.accumulator.lock().pending_len()
    }

    /// Sealed batches waiting for the slot.
    pub fn buffered_batches(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn is_dispatching(&self) -> bool {
        self.shared.slot.available_permits() == 0
    }

    pub fn stats(&self) -> &AggregatorStats {
        &self.shared.stats
    }
}

async fn drain(shared: Arc<Shared>, permit: OwnedSemaphorePermit) {
    let mut permit = Some(permit);

    while let Some(held) = permit.take() {
        loop {
            let next = {
                let mut buffer = shared.buffer.lock();
                let next = buffer.pop_front();
                metrics().batch_buffer_depth.set(buffer.len() as u64);
                next
            };
            match next {
                Some(batch) => dispatch_one(&shared, batch).await,
                None => break,
            }
        }

        drop(held);

        // A batch may have been buffered between the last pop and the release.
        if !shared.buffer.lock().is_empty() {
            permit = Arc::clone(&shared.slot).try_acquire_owned().ok();
        }
    }
}

async fn dispatch_one(shared: &Shared, batch: Batch) {
    let batch_id = batch.id();
    let items = batch.len();
    let dispatcher = Arc::clone(&shared.dispatcher);
    let start = Instant::now();

    let mut task = shared
        .executor
        .spawn(async move { dispatcher.dispatch(&batch).await });

    match tokio::time::timeout(shared.timeout, &mut task).await {
        Ok(Ok(Ok(()))) => {
            let elapsed = start.elapsed();
            shared.stats.dispatched.fetch_add(1, Ordering::Relaxed);
            metrics().batches_dispatched.inc();
            metrics().dispatch_latency_ms.observe(elapsed.as_millis() as u64);
            health().dispatcher.set_healthy();
            info!(
                batch_id = %batch_id,
                items,
                latency_ms = elapsed.as_millis() as u64,
                "Batch dispatched"
            );
        }
        Ok(Ok(Err(e))) => {
            shared.stats.failed.fetch_add(1, Ordering::Relaxed);
            metrics().batch_dispatch_errors.inc();
            health().dispatcher.set_unhealthy(e.to_string());
            error!(batch_id = %batch_id, items, error = %e, "Batch dispatch failed");
        }
        Ok(Err(join_error)) => {
            shared.stats.failed.fetch_add(1, Ordering::Relaxed);
            metrics().batch_dispatch_errors.inc();
            health().dispatcher.set_unhealthy("dispatcher panicked");
            error!(batch_id = %batch_id, items, error = %join_error, "Batch dispatch aborted");
        }
        Err(_) => {
            // Abort so the slot really is free once released.
            task.abort();
            let err = Error::dispatch_timeout(batch_id, shared.timeout);
            shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
            metrics().batches_dropped.inc();
            health().dispatcher.set_unhealthy(err.to_string());
            error!(
                batch_id = %batch_id,
                items,
                timeout_secs = shared.timeout.as_secs_f64(),
                error = %err,
                "Batch dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::IngestionQueue;
    use async_trait::async_trait;
    use engine_core::BatchItem;
    use tokio::sync::Notify;

    fn item(n: usize) -> Item {
        serde_json::from_value(serde_json::json!({
            "created_at": "2024-03-01T12:00:00Z",
            "content": format!("post {}", n),
            "domain": "example.com",
            "url": format!("https://example.com/{}", n),
        }))
        .unwrap()
    }

    /// Records batches; the first `hang` batches block until released, or
    /// forever when `release` is never notified.
    #[derive(Default)]
    struct TestDispatcher {
        batches: Mutex<Vec<Vec<BatchItem>>>,
        hang: AtomicU64,
        release: Notify,
        in_flight: AtomicU64,
        max_in_flight: AtomicU64,
    }

    impl TestDispatcher {
        fn hanging(n: u64) -> Self {
            let d = Self::default();
            d.hang.store(n, Ordering::SeqCst);
            d
        }

        fn total_items(&self) -> usize {
            self.batches.lock().iter().map(Vec::len).sum()
        }
    }

    #[async_trait]
    impl BatchDispatcher for TestDispatcher {
        async fn dispatch(&self, batch: &Batch) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let should_hang = self
                .hang
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| h.checked_sub(1))
                .is_ok();
            if should_hang {
                self.release.notified().await;
            }

            self.batches.lock().push(batch.items().to_vec());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "test"
        }
    }

    fn start(
        dispatcher: Arc<TestDispatcher>,
        batch_size: usize,
        timeout: Duration,
    ) -> (IngestionQueue, BatchAggregator, CancellationToken) {
        let (queue, rx) = IngestionQueue::new();
        let aggregator = BatchAggregator::new(
            batch_size,
            timeout,
            dispatcher,
            Arc::new(DispatchExecutor::in_process()),
            rx,
        );

        let shutdown = CancellationToken::new();
        let runner = aggregator.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { runner.run(token).await });
        (queue, aggregator, shutdown)
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_25_items_give_one_batch_and_5_pending() {
        let dispatcher = Arc::new(TestDispatcher::default());
        let (queue, aggregator, shutdown) =
            start(dispatcher.clone(), 20, Duration::from_secs(5));

        for n in 0..25 {
            queue.push(item(n));
        }

        eventually(|| dispatcher.batches.lock().len() == 1 && aggregator.pending_items() == 5)
            .await;
        // Give the loop a chance to form a second batch it should not form.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let batches = dispatcher.batches.lock();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.len(), 20);
        for (i, tagged) in batch.iter().enumerate() {
            assert_eq!(tagged.position as usize, i + 1);
            assert_eq!(tagged.item.content, format!("post {}", i));
        }
        assert_eq!(aggregator.pending_items(), 5);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_pushes_while_slot_held_are_not_lost() {
        let dispatcher = Arc::new(TestDispatcher::hanging(1));
        let (queue, aggregator, shutdown) =
            start(dispatcher.clone(), 10, Duration::from_secs(10));

        // First batch takes the slot and blocks.
        for n in 0..10 {
            queue.push(item(n));
        }
        eventually(|| aggregator.is_dispatching()).await;

        // Concurrent producers while the slot is held.
        let mut producers = Vec::new();
        for p in 0..4 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for n in 0..25 {
                    queue.push(item(1000 + p * 100 + n));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        eventually(|| aggregator.buffered_batches() == 10).await;
        assert_eq!(dispatcher.batches.lock().len(), 0);

        dispatcher.release.notify_one();
        eventually(|| dispatcher.total_items() == 110).await;

        assert_eq!(dispatcher.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.buffered_batches(), 0);
        assert!(!aggregator.is_dispatching());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_timed_out_batch_is_dropped_and_buffer_keeps_draining() {
        let dispatcher = Arc::new(TestDispatcher::hanging(1));
        let (queue, aggregator, shutdown) =
            start(dispatcher.clone(), 5, Duration::from_millis(100));

        for n in 0..15 {
            queue.push(item(n));
        }

        eventually(|| aggregator.stats().dispatched.load(Ordering::SeqCst) == 2).await;

        assert_eq!(aggregator.stats().dropped.load(Ordering::SeqCst), 1);
        assert!(!aggregator.is_dispatching());
        assert_eq!(aggregator.buffered_batches(), 0);

        // The dropped batch is never retried.
        let batches = dispatcher.batches.lock().clone();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].item.content, "post 5");
        assert_eq!(batches[1][0].item.content, "post 10");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_restarted_loop_keeps_pending_items() {
        let dispatcher = Arc::new(TestDispatcher::default());
        let (queue, aggregator, shutdown) =
            start(dispatcher.clone(), 4, Duration::from_secs(5));

        for n in 0..3 {
            queue.push(item(n));
        }
        eventually(|| aggregator.pending_items() == 3).await;
        shutdown.cancel();

        let restarted = aggregator.clone();
        let token = CancellationToken::new();
        let loop_token = token.clone();
        tokio::spawn(async move { restarted.run(loop_token).await });

        queue.push(item(3));
        eventually(|| dispatcher.batches.lock().len() == 1).await;
        assert_eq!(dispatcher.batches.lock()[0].len(), 4);
        token.cancel();
    }
}
