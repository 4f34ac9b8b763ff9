//! Error handling tests for item ingress.
//!
//! Malformed items never reach the queue; a request with at least one valid
//! item is still accepted.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};

fn server(ctx: &TestContext) -> TestServer {
    TestServer::new(ctx.router.clone()).expect("Failed to create test server")
}

/// Test invalid JSON returns 400 with VALID_001
#[tokio::test]
async fn test_invalid_json() {
    let ctx = TestContext::new(20);
    let server = server(&ctx);

    let response = server
        .post("/items")
        .content_type("application/json")
        .bytes("{not valid json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}

/// Test a JSON scalar is not an item
#[tokio::test]
async fn test_wrong_shape() {
    let ctx = TestContext::new(20);
    let server = server(&ctx);

    let response = server.post("/items").json(&serde_json::json!(42)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

/// Test missing content is rejected with VALID_002
#[tokio::test]
async fn test_missing_field() {
    let ctx = TestContext::new(20);
    let server = server(&ctx);

    let response = server
        .post("/items")
        .json(&fixtures::item_without_content())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_002");
    assert!(body["details"].as_array().is_some_and(|d| !d.is_empty()));
    assert_eq!(ctx.aggregator.pending_items(), 0);
}

/// Test an invalid URL is rejected
#[tokio::test]
async fn test_invalid_url() {
    let ctx = TestContext::new(20);
    let server = server(&ctx);

    let response = server.post("/items").json(&fixtures::item_with_bad_url()).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

/// Test an oversized item returns 413 with VALID_003
#[tokio::test]
async fn test_oversized_item() {
    let ctx = TestContext::new(20);
    let server = server(&ctx);

    let response = server.post("/items").json(&fixtures::oversized_item()).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_003");
}

/// Test too many items in one request
#[tokio::test]
async fn test_too_many_items() {
    let ctx = TestContext::new(20);
    let server = server(&ctx);

    let response = server.post("/items").json(&fixtures::items_json(501)).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

/// Test valid items are kept when some are malformed
#[tokio::test]
async fn test_partial_acceptance() {
    let ctx = TestContext::new(3);
    let server = server(&ctx);

    let mut items = fixtures::items_json(3);
    items.insert(1, fixtures::item_without_content());

    let response = server.post("/items").json(&items).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], 3);
    assert_eq!(body["errors"].as_array().map(|e| e.len()), Some(1));

    ctx.wait_for_batches(1).await;
    let batches = ctx.dispatcher.batches();
    let urls: Vec<&str> = batches[0].items().iter().map(|i| i.item.url.as_str()).collect();
    assert_eq!(
        urls,
        [
            "https://news.example.com/posts/0",
            "https://news.example.com/posts/1",
            "https://news.example.com/posts/2",
        ]
    );
}
