//! Scenario: the reqwest transport speaks JSON and surfaces every failure
//!
//! # Invariant under test
//! Requests carry `Content-Type` and `Accept: application/json`, paths are
//! joined to the API root with a single slash, a 2xx JSON body is returned
//! as-is, and a non-2xx status or a non-JSON body becomes a
//! `TransportFailure` that keeps the status and body for diagnosis.
//!
//! All tests run against a local mock server; no external network required.

use httpmock::prelude::*;
use lom_cli::{ApiTransport, HttpTransport, TransportFailure};
use serde_json::json;

#[tokio::test]
async fn post_sends_json_headers_and_returns_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/tubes")
                .header("content-type", "application/json")
                .header("accept", "application/json")
                .json_body(json!({"tube": {}}));
            then.status(200).json_body(json!({
                "tube": {"uuid": "t-1", "labels": [], "created_at": "2026-01-01T00:00:00Z"}
            }));
        })
        .await;

    let transport = HttpTransport::new(format!("{}/", server.base_url()));
    let resp = transport.post("/tubes", &json!({"tube": {}})).await.unwrap();
    assert_eq!(resp["tube"]["uuid"], "t-1");
    mock.assert_async().await;
}

#[tokio::test]
async fn get_follows_relative_result_links() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/s-1/page=1");
            then.status(200).json_body(json!({"size": 0, "tubes": [], "actions": {}}));
        })
        .await;

    let transport = HttpTransport::new(server.base_url());
    let resp = transport.get("/s-1/page=1").await.unwrap();
    assert_eq!(resp["size"], 0);
}

#[tokio::test]
async fn non_success_status_is_a_failure_with_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/actions/transfer_tubes_to_tubes");
            then.status(409)
                .json_body(json!({"error": "source a exhausted", "code": "INSUFFICIENT_SOURCE"}));
        })
        .await;

    let transport = HttpTransport::new(server.base_url());
    let err = transport
        .post("actions/transfer_tubes_to_tubes", &json!({}))
        .await
        .unwrap_err();
    match err {
        TransportFailure::Status { status, body, .. } => {
            assert_eq!(status, 409);
            assert!(body.contains("INSUFFICIENT_SOURCE"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_decode_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/health");
            then.status(200).body("ok");
        })
        .await;

    let transport = HttpTransport::new(server.base_url());
    let err = transport.get("health").await.unwrap_err();
    assert!(matches!(err, TransportFailure::Decode { .. }));
}

#[tokio::test]
async fn unreachable_server_is_a_request_failure() {
    // Port 9 (discard) on localhost is not expected to run an HTTP server.
    let transport = HttpTransport::new("http://127.0.0.1:9");
    let err = transport.get("health").await.unwrap_err();
    assert!(matches!(err, TransportFailure::Request { .. }));
}
