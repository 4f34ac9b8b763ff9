//! Where dispatch calls run.
//!
//! Either on the caller's runtime, or on a dedicated thread that owns its
//! own single-threaded runtime so slow downstream calls never occupy the
//! main workers. Callers only see a `JoinHandle` in both cases.

use std::future::Future;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

pub struct DispatchExecutor {
    handle: Handle,
    // Dropping the sender stops the dedicated runtime.
    stop: Option<oneshot::Sender<()>>,
}

impl DispatchExecutor {
    /// Runs dispatches on the current runtime.
    pub fn in_process() -> Self {
        Self {
            handle: Handle::current(),
            stop: None,
        }
    }

    /// Starts a thread named `name` hosting a current-thread runtime.
    pub fn dedicated(name: &str) -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread_name = name.to_string();
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
                info!(thread = %thread_name, "Dispatch runtime stopped");
            })?;

        info!(thread = %name, "Dispatch runtime started");
        Ok(Self {
            handle,
            stop: Some(stop_tx),
        })
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    pub fn is_dedicated(&self) -> bool {
        self.stop.is_some()
    }
}
