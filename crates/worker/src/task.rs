//! One source worker: pick a keyword, query the source, pull items into
//! the ingestion queue until the sequence ends or fails.

use crate::selector::KeywordSelector;
use crate::source::{Pull, Source};
use engine_core::{Error, Result};
use live_config::ConfigResolver;
use parking_lot::Mutex;
use pipeline::IngestionQueue;
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of a worker task. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Starting,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Sent once per task when it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub source_id: String,
    pub task_id: u64,
    pub state: TaskState,
}

/// What every worker needs besides its source.
pub struct WorkerContext {
    pub resolver: ConfigResolver,
    pub selector: KeywordSelector,
    pub queue: IngestionQueue,
    pub pull_timeout: Duration,
    pub pull_pause: Duration,
}

impl WorkerContext {
    pub fn new(
        resolver: ConfigResolver,
        queue: IngestionQueue,
        pull_timeout: Duration,
        pull_pause: Duration,
    ) -> Self {
        Self {
            selector: KeywordSelector::new(resolver.clone()),
            resolver,
            queue,
            pull_timeout,
            pull_pause,
        }
    }
}

/// The scheduler's view of a spawned worker.
pub struct TaskHandle {
    pub id: u64,
    state: Arc<Mutex<TaskState>>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal() || self.join.is_finished()
    }
}

/// Marks the task terminal and reports it, even if the body panics.
struct CompletionGuard {
    source_id: String,
    task_id: u64,
    state: Arc<Mutex<TaskState>>,
    events: UnboundedSender<TaskEvent>,
    outcome: Option<TaskState>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let state = self.outcome.unwrap_or(TaskState::Failed);
        *self.state.lock() = state;

        match state {
            TaskState::Completed => metrics().workers_completed.inc(),
            _ => metrics().workers_failed.inc(),
        }
        metrics().live_workers.dec();

        let _ = self.events.send(TaskEvent {
            source_id: std::mem::take(&mut self.source_id),
            task_id: self.task_id,
            state,
        });
    }
}

/// Spawns a worker for `source` and returns its handle.
pub fn spawn_worker(
    ctx: Arc<WorkerContext>,
    source: Arc<dyn Source>,
    task_id: u64,
    events: UnboundedSender<TaskEvent>,
    shutdown: CancellationToken,
) -> TaskHandle {
    let state = Arc::new(Mutex::new(TaskState::Starting));
    let guard = CompletionGuard {
        source_id: source.id().to_string(),
        task_id,
        state: Arc::clone(&state),
        events,
        outcome: None,
    };

    metrics().workers_spawned.inc();
    metrics().live_workers.inc();

    let task_state = Arc::clone(&state);
    let join = tokio::spawn(async move {
        // Owned by the task: dropped on return, panic or abort.
        let mut guard = guard;
        let outcome = run_worker(&ctx, source.as_ref(), task_id, &task_state, &shutdown).await;
        guard.outcome = Some(match outcome {
            Ok(()) => TaskState::Completed,
            Err(e) => {
                if e.is_recoverable() {
                    warn!(source = %source.id(), task_id, error = %e, "Worker failed");
                } else {
                    error!(source = %source.id(), task_id, error = %e, "Worker failed on a permanent error");
                }
                TaskState::Failed
            }
        });
    });

    TaskHandle { id: task_id, state, join }
}

async fn run_worker(
    ctx: &WorkerContext,
    source: &dyn Source,
    task_id: u64,
    state: &Mutex<TaskState>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let source_id = source.id();

    let startup = async {
        let remote_languages = ctx
            .resolver
            .sources_configuration()
            .await
            .languages_for(source_id);
        let languages = if remote_languages.is_empty() {
            source.languages()
        } else {
            remote_languages
        };

        let keyword = ctx.selector.choose_keyword(source_id, &languages).await;
        let parameters = ctx.resolver.fetch_parameters(source_id, &keyword.value).await;

        match tokio::time::timeout(ctx.pull_timeout, source.query(parameters)).await {
            Ok(stream) => stream.map(|stream| (keyword, stream)),
            Err(_) => Err(Error::worker_fault(
                source_id,
                format!("query did not answer within {:?}", ctx.pull_timeout),
            )),
        }
    };

    let (keyword, mut stream) = tokio::select! {
        _ = shutdown.cancelled() => {
            debug!(source = %source_id, task_id, "Worker stopping before its first pull");
            return Ok(());
        }
        started = startup => started?,
    };

    *state.lock() = TaskState::Running;
    info!(
        source = %source_id,
        task_id,
        keyword = %keyword.value,
        strategy = %keyword.strategy,
        "Worker running"
    );

    let mut pulled = 0u64;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(source = %source_id, task_id, pulled, "Worker stopping on shutdown");
                return Ok(());
            }
            _ = tokio::time::sleep(ctx.pull_pause) => {}
        }

        let pull = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            pull = tokio::time::timeout(ctx.pull_timeout, stream.pull()) => pull,
        };

        match pull {
            Ok(Pull::Item(item)) => {
                pulled += 1;
                metrics().items_by_source.inc(source_id);
                ctx.queue.push(item);
            }
            Ok(Pull::Exhausted) => {
                info!(source = %source_id, task_id, pulled, "Source exhausted");
                return Ok(());
            }
            Ok(Pull::Error(e)) => return Err(e),
            Err(_) => {
                return Err(Error::worker_fault(
                    source_id,
                    format!("no item within {:?}", ctx.pull_timeout),
                ));
            }
        }
    }
}
