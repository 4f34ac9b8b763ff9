//! Tests for health check and metrics endpoints.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};
use telemetry::health;

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new(20);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in ["status", "components", "queue_depth", "live_workers", "uptime_secs"] {
        assert!(body.get(field).is_some(), "Response should have '{}' field", field);
    }

    let names: Vec<&str> = body["components"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, ["remote_config", "dispatcher"]);
}

/// Test liveness never depends on collaborators
#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new(20);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server.get("/health/live").await.assert_status_ok();
}

/// Test readiness follows dispatcher health
#[tokio::test]
async fn test_ready_endpoint_follows_dispatcher() {
    let ctx = TestContext::new(20);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    health().dispatcher.set_unhealthy("test");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    health().dispatcher.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
}

/// Test /metrics reflects accepted items
#[tokio::test]
async fn test_metrics_endpoint() {
    let ctx = TestContext::new(20);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server
        .post("/items")
        .json(&fixtures::items_json(3))
        .await
        .assert_status_ok();

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["items_received"].as_u64().unwrap() >= 3);
    assert!(body["items_queued"].as_u64().unwrap() >= 3);
    assert!(body.get("supervisor_restarts").is_some());
}
