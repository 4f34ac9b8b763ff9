//! End-to-end tests for the ingestion pipeline.
//!
//! These tests drive the full data flow with an in-memory dispatcher:
//! POST /items (or a source worker) → IngestionQueue → BatchAggregator →
//! RecordingDispatcher.

use axum_test::TestServer;
use engine_core::KeywordStrategy;
use integration_tests::{
    fixtures,
    mocks::{RecordingDispatcher, ScriptedSource, StaticFetcher},
    setup::{self, TestContext, CATALOG_URL, KEYWORDS_URL, SOURCES_URL},
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use worker::{Source, WorkerConfig, WorkerContext, WorkerPoolScheduler};

/// 25 items with batch size 20: one batch of 20, five left pending.
#[tokio::test]
async fn test_items_are_batched_in_arrival_order() {
    let ctx = TestContext::new(20);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.post("/items").json(&fixtures::items_json(25)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["received"], 25);

    ctx.wait_for_batches(1).await;
    setup::wait_until(|| ctx.aggregator.pending_items() == 5).await;

    let batches = ctx.dispatcher.batches();
    assert_eq!(batches.len(), 1, "Only one full batch should be dispatched");

    let batch = &batches[0];
    let positions: Vec<u32> = batch.items().iter().map(|i| i.position).collect();
    assert_eq!(positions, (1..=20).collect::<Vec<u32>>());
    for (n, entry) in batch.items().iter().enumerate() {
        assert_eq!(entry.item.url, format!("https://news.example.com/posts/{}", n));
    }

    ctx.stop().await;
}

/// Several batches sealed behind a slow dispatch go out one at a time.
#[tokio::test]
async fn test_batches_are_dispatched_single_flight() {
    let dispatcher = RecordingDispatcher::slow(Duration::from_millis(30));
    let ctx = TestContext::with_dispatcher(10, dispatcher, Duration::from_secs(5));
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    // Separate requests so the batches queue up behind each other.
    for chunk in fixtures::items_json(40).chunks(10) {
        server.post("/items").json(&chunk.to_vec()).await.assert_status_ok();
    }

    ctx.wait_for_batches(4).await;
    assert_eq!(ctx.dispatcher.max_in_flight(), 1);
    assert_eq!(ctx.aggregator.buffered_batches(), 0);

    let urls: Vec<String> = ctx
        .dispatcher
        .batches()
        .iter()
        .flat_map(|b| b.items().iter().map(|i| i.item.url.clone()).collect::<Vec<_>>())
        .collect();
    let expected: Vec<String> = (0..40)
        .map(|n| format!("https://news.example.com/posts/{}", n))
        .collect();
    assert_eq!(urls, expected, "Items must leave in the order they arrived");

    ctx.stop().await;
}

/// A failed dispatch is counted and the next batch still goes out.
#[tokio::test]
async fn test_dispatch_failure_does_not_stall_the_pipeline() {
    let ctx = TestContext::new(5);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    ctx.dispatcher.set_should_fail(true);
    server.post("/items").json(&fixtures::items_json(5)).await.assert_status_ok();
    setup::wait_until(|| ctx.aggregator.stats().failed.load(Ordering::SeqCst) == 1).await;

    ctx.dispatcher.set_should_fail(false);
    server.post("/items").json(&fixtures::items_json(5)).await.assert_status_ok();
    ctx.wait_for_batches(1).await;

    assert_eq!(ctx.aggregator.stats().dispatched.load(Ordering::SeqCst), 1);
    ctx.stop().await;
}

/// Source worker → queue → aggregator, with keyword and parameters from
/// the remote configuration.
#[tokio::test]
async fn test_source_worker_feeds_the_aggregator() {
    let store_dir = tempfile::tempdir().unwrap();
    let fetcher = StaticFetcher::new();
    fetcher.serve(SOURCES_URL, fixtures::sources_document(0, &[("scripted", 1)]));
    fetcher.serve(CATALOG_URL, "{}");
    fetcher.serve(KEYWORDS_URL, "bitcoin");
    let (resolver, _clock) = setup::test_resolver(fetcher, &store_dir);

    let ctx = TestContext::new(4);

    let source = ScriptedSource::new("scripted", (0..4).map(fixtures::item).collect());
    let queries = source.queries();
    let sources: Vec<Arc<dyn Source>> = vec![Arc::new(source)];

    let worker_ctx = Arc::new(WorkerContext::new(
        resolver.clone(),
        ctx.queue.clone(),
        Duration::from_secs(5),
        Duration::ZERO,
    ));
    let shutdown = CancellationToken::new();
    let mut scheduler = WorkerPoolScheduler::new(
        WorkerConfig::default(),
        sources,
        Arc::new(resolver),
        worker_ctx,
        shutdown.clone(),
    );

    assert_eq!(scheduler.reconcile().await, 1);
    ctx.wait_for_batches(1).await;

    let batches = ctx.dispatcher.batches();
    assert_eq!(batches[0].len(), 4);

    let queries = queries.lock();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].keyword(), Some("bitcoin"));
    assert_eq!(queries[0].get("max_oldness_seconds"), Some(&serde_json::json!(60)));

    shutdown.cancel();
    drop(queries);
    ctx.stop().await;
}

/// With the cursor at 100 every keyword comes from the topic catalog.
#[tokio::test]
async fn test_cursor_100_uses_topic_catalog() {
    let store_dir = tempfile::tempdir().unwrap();
    let fetcher = StaticFetcher::new();
    fetcher.serve(SOURCES_URL, fixtures::sources_document(100, &[]));
    fetcher.serve(
        CATALOG_URL,
        serde_json::json!({ "Bitcoin": { "en": ["btc"] } }).to_string(),
    );
    fetcher.serve(KEYWORDS_URL, "flat-only");
    let (resolver, _clock) = setup::test_resolver(fetcher, &store_dir);

    let selector = worker::KeywordSelector::new(resolver);
    for _ in 0..50 {
        let keyword = selector
            .choose_keyword("scripted", &engine_core::LanguageCapability::All)
            .await;
        assert_eq!(keyword.value, "btc");
        assert_eq!(keyword.strategy, KeywordStrategy::TopicLanguage);
    }
}
