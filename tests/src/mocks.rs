//! Mock implementations for testing.

use async_trait::async_trait;
use engine_core::{Batch, Error, FetchParameters, Item, Result};
use live_config::RemoteFetcher;
use parking_lot::Mutex;
use pipeline::BatchDispatcher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use worker::{ItemStream, Source, VecStream};

/// Dispatcher that records every batch it receives.
///
/// Implements the same `BatchDispatcher` trait as the HTTP dispatcher, so
/// tests see exactly what would leave the process.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    batches: Arc<Mutex<Vec<Batch>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Option<Duration>,
    should_fail: Arc<AtomicBool>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatch takes `delay` before it completes.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Highest number of dispatches observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BatchDispatcher for RecordingDispatcher {
    async fn dispatch(&self, batch: &Batch) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(Error::dispatch(batch.id(), "mock dispatcher failure"));
        }
        self.batches.lock().push(batch.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Source that yields a fixed list of items per query, then exhausts.
pub struct ScriptedSource {
    id: String,
    items: Vec<Item>,
    queries: Arc<Mutex<Vec<FetchParameters>>>,
}

impl ScriptedSource {
    pub fn new(id: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            id: id.into(),
            items,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Parameters of every query received so far.
    pub fn queries(&self) -> Arc<Mutex<Vec<FetchParameters>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn query(&self, parameters: FetchParameters) -> Result<Box<dyn ItemStream>> {
        self.queries.lock().push(parameters);
        Ok(Box::new(VecStream::new(self.items.clone())))
    }
}

/// Remote fetcher serving canned documents; unknown URLs fail.
#[derive(Clone, Default)]
pub struct StaticFetcher {
    documents: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: impl Into<String>, body: impl Into<String>) {
        self.documents.lock().insert(url.into(), body.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for StaticFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::config_fetch(url, "not served"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_dispatcher_captures_batches() {
        let dispatcher = RecordingDispatcher::new();
        let batch = Batch::seal(vec![crate::fixtures::item(0)]);

        dispatcher.dispatch(&batch).await.unwrap();
        assert_eq!(dispatcher.batch_count(), 1);
        assert_eq!(dispatcher.max_in_flight(), 1);

        dispatcher.set_should_fail(true);
        assert!(dispatcher.dispatch(&batch).await.is_err());
        assert_eq!(dispatcher.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_static_fetcher_fails_unknown_urls() {
        let fetcher = StaticFetcher::new();
        fetcher.serve("https://config.test/a", "{}");

        assert_eq!(fetcher.fetch_text("https://config.test/a").await.unwrap(), "{}");
        assert!(fetcher.fetch_text("https://config.test/b").await.is_err());
        assert_eq!(fetcher.calls(), 2);
    }
}
