//! Common test setup functions.

use api::{router, AppState};
use axum::Router;
use engine_core::ManualClock;
use live_config::{ConcurrencyOverrides, ConfigResolver, LiveConfigSettings};
use pipeline::{BatchAggregator, DispatchExecutor, IngestionQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mocks::{RecordingDispatcher, StaticFetcher};

pub const SOURCES_URL: &str = "https://config.test/sources.json";
pub const CATALOG_URL: &str = "https://config.test/catalog.json";
pub const KEYWORDS_URL: &str = "https://config.test/keywords.txt";

/// Test context running the real router and aggregator.
///
/// The dispatcher is a `RecordingDispatcher`, so everything up to the
/// downstream call runs the production code paths.
pub struct TestContext {
    pub queue: IngestionQueue,
    pub aggregator: BatchAggregator,
    pub dispatcher: RecordingDispatcher,
    pub router: Router,
    pub shutdown: CancellationToken,
    aggregator_handle: Option<JoinHandle<engine_core::Result<()>>>,
}

impl TestContext {
    pub fn new(batch_size: usize) -> Self {
        Self::with_dispatcher(batch_size, RecordingDispatcher::new(), Duration::from_secs(5))
    }

    pub fn with_dispatcher(
        batch_size: usize,
        dispatcher: RecordingDispatcher,
        timeout: Duration,
    ) -> Self {
        let (queue, receiver) = IngestionQueue::new();
        let aggregator = BatchAggregator::new(
            batch_size,
            timeout,
            Arc::new(dispatcher.clone()),
            Arc::new(DispatchExecutor::in_process()),
            receiver,
        );

        let shutdown = CancellationToken::new();
        let running = aggregator.clone();
        let token = shutdown.clone();
        let aggregator_handle = tokio::spawn(async move { running.run(token).await });

        let router = router(AppState::new(queue.clone()));

        Self {
            queue,
            aggregator,
            dispatcher,
            router,
            shutdown,
            aggregator_handle: Some(aggregator_handle),
        }
    }

    /// Waits until `count` batches were dispatched, or panics after 5s.
    pub async fn wait_for_batches(&self, count: usize) {
        wait_until(|| self.dispatcher.batch_count() >= count).await;
    }

    /// Cancels the aggregator loop and waits for it to return.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.aggregator_handle.take() {
            handle
                .await
                .expect("aggregator task panicked")
                .expect("aggregator loop failed");
        }
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Polls `check` every 10ms for up to 5s.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}

/// Live-config settings pointing at the `StaticFetcher` URLs.
pub fn test_settings(store_dir: &tempfile::TempDir) -> LiveConfigSettings {
    LiveConfigSettings {
        sources_url: SOURCES_URL.to_string(),
        catalog_url: CATALOG_URL.to_string(),
        keywords_url: KEYWORDS_URL.to_string(),
        keyword_store_path: store_dir.path().join("keywords.json"),
        retry_attempts: 1,
        retry_unit_ms: 0,
        ..Default::default()
    }
}

/// A resolver backed by `fetcher` and a manual clock.
pub fn test_resolver(
    fetcher: StaticFetcher,
    store_dir: &tempfile::TempDir,
) -> (ConfigResolver, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let resolver = ConfigResolver::with_parts(
        test_settings(store_dir),
        Arc::new(fetcher),
        clock.clone(),
        ConcurrencyOverrides::default(),
    );
    (resolver, clock)
}
