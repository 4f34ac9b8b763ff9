//! Worker pool scheduler.
//!
//! Keeps the number of live workers per source equal to the desired
//! concurrency. Reconciliation runs on every tick and immediately for a
//! source whenever one of its workers terminates. Workers are never killed
//! to shrink a pool; surplus workers simply are not replaced.

use crate::config::WorkerConfig;
use crate::source::Source;
use crate::task::{spawn_worker, TaskEvent, TaskHandle, TaskState, WorkerContext};
use async_trait::async_trait;
use engine_core::{ConcurrencyConfig, Result};
use live_config::ConfigResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where desired concurrency comes from.
#[async_trait]
pub trait ConcurrencySource: Send + Sync {
    async fn concurrency_config(&self) -> ConcurrencyConfig;
}

#[async_trait]
impl ConcurrencySource for ConfigResolver {
    async fn concurrency_config(&self) -> ConcurrencyConfig {
        ConfigResolver::concurrency_config(self).await
    }
}

/// Owns every source's task set.
pub struct WorkerPoolScheduler {
    config: WorkerConfig,
    sources: Vec<Arc<dyn Source>>,
    concurrency: Arc<dyn ConcurrencySource>,
    ctx: Arc<WorkerContext>,
    tasks: HashMap<String, Vec<TaskHandle>>,
    events_tx: UnboundedSender<TaskEvent>,
    events_rx: UnboundedReceiver<TaskEvent>,
    next_task_id: u64,
    shutdown: CancellationToken,
}

impl WorkerPoolScheduler {
    pub fn new(
        config: WorkerConfig,
        sources: Vec<Arc<dyn Source>>,
        concurrency: Arc<dyn ConcurrencySource>,
        ctx: Arc<WorkerContext>,
        shutdown: CancellationToken,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            sources,
            concurrency,
            ctx,
            tasks: HashMap::new(),
            events_tx,
            events_rx,
            next_task_id: 0,
            shutdown,
        }
    }

    /// Tick and event loop. Returns once shutdown is requested.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            sources = self.sources.len(),
            interval_ms = self.config.reconcile_interval_ms,
            "Worker pool scheduler started"
        );

        let mut ticker = interval(self.config.reconcile_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = self.shutdown.clone();

        loop {
            // Reconciling may wait on a cold configuration fetch, so it is
            // raced against shutdown as well.
            let cancelled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => true,
                Some(event) = self.events_rx.recv() => tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => true,
                    _ = self.handle_event(event) => false,
                },
                _ = ticker.tick() => tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => true,
                    _ = self.reconcile() => false,
                },
            };
            if cancelled {
                break;
            }
        }

        info!(live = self.total_live(), "Worker pool scheduler stopped");
        Ok(())
    }

    /// One pass over every source. Returns the number of workers spawned.
    pub async fn reconcile(&mut self) -> usize {
        let desired = self.concurrency.concurrency_config().await;
        let sources = self.sources.clone();

        sources
            .iter()
            .map(|source| self.reconcile_source(source, desired.desired_for(source.id())))
            .sum()
    }

    /// Drops terminal tasks, then tops the pool up to `desired`.
    pub fn reconcile_source(&mut self, source: &Arc<dyn Source>, desired: u32) -> usize {
        if self.shutdown.is_cancelled() {
            return 0;
        }

        let tasks = self.tasks.entry(source.id().to_string()).or_default();
        tasks.retain(|task| !task.is_terminal());

        let missing = (desired as usize).saturating_sub(tasks.len());
        for _ in 0..missing {
            self.next_task_id += 1;
            let handle = spawn_worker(
                Arc::clone(&self.ctx),
                Arc::clone(source),
                self.next_task_id,
                self.events_tx.clone(),
                self.shutdown.child_token(),
            );
            tasks.push(handle);
        }

        if missing > 0 {
            debug!(
                source = %source.id(),
                desired,
                live = tasks.len(),
                spawned = missing,
                "Reconciled source"
            );
        }
        missing
    }

    /// Waits for the next terminal-task event and reconciles its source.
    pub async fn process_next_event(&mut self) -> Option<TaskEvent> {
        let event = self.events_rx.recv().await?;
        self.handle_event(event.clone()).await;
        Some(event)
    }

    async fn handle_event(&mut self, event: TaskEvent) {
        match event.state {
            TaskState::Failed => warn!(
                source = %event.source_id,
                task_id = event.task_id,
                "Worker failed, reconciling"
            ),
            _ => debug!(
                source = %event.source_id,
                task_id = event.task_id,
                "Worker completed, reconciling"
            ),
        }

        let Some(source) = self
            .sources
            .iter()
            .find(|s| s.id() == event.source_id)
            .cloned()
        else {
            return;
        };

        let desired = self.concurrency.concurrency_config().await;
        self.reconcile_source(&source, desired.desired_for(&event.source_id));
    }

    /// Non-terminal tasks for one source.
    pub fn live_count(&self, source_id: &str) -> usize {
        self.tasks
            .get(source_id)
            .map(|tasks| tasks.iter().filter(|t| !t.is_terminal()).count())
            .unwrap_or(0)
    }

    pub fn total_live(&self) -> usize {
        self.tasks
            .values()
            .flatten()
            .filter(|t| !t.is_terminal())
            .count()
    }
}
