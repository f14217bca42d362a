//! Scenario: HTTP surface maps every operation and error class
//!
//! # Invariant under test
//! Each route decodes its JSON body, calls the lab, and answers with the
//! documented shape. Domain errors keep their code and land on the right
//! status: not-found family → 404, state conflicts → 409, validation → 422,
//! malformed JSON → 400. A rejected request leaves state unchanged.
//!
//! All tests are pure in-process; no network required.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lom_daemon::{routes, state};
use lom_engine::LabConfig;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router(config: LabConfig) -> axum::Router {
    routes::build_router(Arc::new(state::AppState::new(config)))
}

async fn call(router: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("body is not valid JSON")
    };
    (status, json)
}

async fn get(router: &axum::Router, path: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    call(router, req).await
}

async fn post(router: &axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    call(router, req).await
}

async fn new_tube(router: &axum::Router) -> String {
    let (status, body) = post(router, "/tubes", json!({"tube": {}})).await;
    assert_eq!(status, StatusCode::OK);
    body["tube"]["uuid"].as_str().unwrap().to_string()
}

async fn started_order(router: &axum::Router, source: &str, target: &str) -> String {
    let (status, body) = post(
        router,
        "/orders",
        json!({"order": {
            "user_uuid": "user uuid",
            "study_uuid": "study uuid",
            "pipeline": "pipeline 1",
            "cost_code": "cost code A",
            "sources": {"Input": [{"uuid": source}]},
            "targets": {"Out": [{"uuid": target}]}
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let uuid = body["order"]["uuid"].as_str().unwrap().to_string();
    for event in ["build", "start"] {
        let (status, _) = post(router, &format!("/{uuid}"), json!({ "event": event })).await;
        assert_eq!(status, StatusCode::OK);
    }
    uuid
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_service_name() {
    let router = make_router(LabConfig::default());
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "lom-daemon");
}

#[tokio::test]
async fn created_resources_are_readable_with_labels() {
    let router = make_router(LabConfig::default());
    let (status, body) = post(&router, "/spin_columns", json!({"spin_column": {}})).await;
    assert_eq!(status, StatusCode::OK);
    let uuid = body["spin_column"]["uuid"].as_str().unwrap().to_string();

    let (status, _) = post(
        &router,
        "/labellables",
        json!({"labellable": {
            "name": uuid,
            "type": "resource",
            "labels": {"front barcode": {"value": "DEF1234", "type": "sanger-barcode"}}
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&router, &format!("/{uuid}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spin_column"]["labels"][0]["value"], "DEF1234");
    assert_eq!(body["spin_column"]["labels"][0]["type"], "sanger-barcode");
}

#[tokio::test]
async fn labellable_for_non_resource_is_rejected() {
    let router = make_router(LabConfig::default());
    let uuid = new_tube(&router).await;
    let (status, body) = post(
        &router,
        "/labellables",
        json!({"labellable": {"name": uuid, "type": "plate", "labels": {}}}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_LABEL");
}

#[tokio::test]
async fn malformed_json_is_400() {
    let router = make_router(LabConfig::default());
    let req = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(&router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MALFORMED_BODY");
}

#[tokio::test]
async fn order_with_unknown_resource_is_404() {
    let router = make_router(LabConfig::default());
    let (status, body) = post(
        &router,
        "/orders",
        json!({"order": {
            "user_uuid": "u", "study_uuid": "s", "pipeline": "p", "cost_code": "c",
            "sources": {"Input": [{"uuid": "missing"}]}
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn illegal_order_event_is_409_and_changes_nothing() {
    let router = make_router(LabConfig::default());
    let a = new_tube(&router).await;
    let b = new_tube(&router).await;
    let order = started_order(&router, &a, &b).await;

    let (status, body) = post(&router, &format!("/{order}"), json!({"event": "build"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (_, body) = get(&router, &format!("/{order}")).await;
    assert_eq!(body["order"]["status"], "in_progress");
}

#[tokio::test]
async fn item_batch_is_atomic_over_http() {
    let router = make_router(LabConfig::default());
    let a = new_tube(&router).await;
    let b = new_tube(&router).await;
    let order = started_order(&router, &a, &b).await;

    // Second entry names an item that does not exist: nothing may apply.
    let (status, body) = post(
        &router,
        &format!("/{order}"),
        json!({"items": {
            "Out": {b.clone(): {"event": "start"}},
            "Zzz": {"x": {"event": "start"}}
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ITEM_NOT_FOUND");
    let (_, body) = get(&router, &format!("/{order}")).await;
    assert_eq!(body["order"]["items"]["Out"][0]["status"], "pending");

    let (status, body) = post(
        &router,
        &format!("/{order}"),
        json!({"items": {"Out": {b.clone(): {"event": "start"}}}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["items"]["Out"][0]["status"], "in_progress");
}

#[tokio::test]
async fn empty_update_is_422() {
    let router = make_router(LabConfig::default());
    let a = new_tube(&router).await;
    let b = new_tube(&router).await;
    let order = started_order(&router, &a, &b).await;
    let (status, body) = post(&router, &format!("/{order}"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_ORDER");
}

#[tokio::test]
async fn overdraw_is_409_and_reports_remaining_on_success() {
    let router = make_router(LabConfig::default());
    let a = new_tube(&router).await;
    let b = new_tube(&router).await;
    started_order(&router, &a, &b).await;

    let body = |f: f64| {
        json!({"transfer_tubes_to_tubes": {"transfers": [
            {"source_uuid": a, "target_uuid": b, "fraction": f, "aliquot_type": "DNA"}
        ]}})
    };
    let (status, resp) = post(&router, "/actions/transfer_tubes_to_tubes", body(0.6)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["transfer_tubes_to_tubes"]["transfers"][0]["seq"], 1);
    let left = resp["transfer_tubes_to_tubes"]["remaining"][&a].as_f64().unwrap();
    assert!((left - 0.4).abs() < 1e-9);

    let (status, resp) = post(&router, "/actions/transfer_tubes_to_tubes", body(0.6)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(resp["code"], "INSUFFICIENT_SOURCE");

    let (status, resp) = post(&router, "/actions/transfer_tubes_to_tubes", body(0.0)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["code"], "INVALID_FRACTION");
}

#[tokio::test]
async fn transfer_outside_active_order_is_409() {
    let router = make_router(LabConfig::default());
    let a = new_tube(&router).await;
    let b = new_tube(&router).await;
    let (status, body) = post(
        &router,
        "/actions/transfer_tubes_to_tubes",
        json!({"transfer_tubes_to_tubes": {"transfers": [
            {"source_uuid": a, "target_uuid": b, "fraction": 0.5, "aliquot_type": "DNA"}
        ]}}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ORDER_NOT_READY");
}

#[tokio::test]
async fn search_pages_follow_links() {
    let router = make_router(LabConfig {
        page_size: 2,
        ..LabConfig::default()
    });
    let mut tubes = Vec::new();
    for _ in 0..3 {
        tubes.push(new_tube(&router).await);
    }

    let (status, body) = post(
        &router,
        "/searches",
        json!({"search": {"description": "all tubes", "model": "tube", "criteria": {}}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = body["search"]["actions"]["first"].as_str().unwrap().to_string();

    let (status, page1) = get(&router, &first).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page1["size"], 3);
    assert_eq!(page1["tubes"].as_array().unwrap().len(), 2);
    assert_eq!(page1["tubes"][0]["tube"]["uuid"], tubes[0].as_str());
    assert!(page1["actions"].get("previous").is_none());

    let next = page1["actions"]["next"].as_str().unwrap().to_string();
    let (_, page2) = get(&router, &next).await;
    assert_eq!(page2["tubes"][0]["tube"]["uuid"], tubes[2].as_str());
    assert!(page2["actions"].get("next").is_none());
    assert_eq!(page2["actions"]["last"], next.as_str());

    let search_uuid = body["search"]["uuid"].as_str().unwrap();
    let (status, _) = get(&router, &format!("/{search_uuid}/page=0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, beyond) = get(&router, &format!("/{search_uuid}/page=9")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(beyond["tubes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_errors_are_422() {
    let router = make_router(LabConfig::default());
    let (status, body) = post(
        &router,
        "/searches",
        json!({"search": {"description": "", "model": "plate", "criteria": {}}}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "UNSUPPORTED_MODEL");

    let (status, body) = post(
        &router,
        "/searches",
        json!({"search": {"model": "tube", "criteria": {"order": {"item": {"volume": 3}}}}}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_CRITERIA");
    assert!(body["error"].as_str().unwrap().contains("/order/item/volume"));
}

#[tokio::test]
async fn unknown_identifier_is_404() {
    let router = make_router(LabConfig::default());
    let (status, body) = get(&router, "/no-such-thing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = get(&router, "/no-such-search/page=1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SEARCH_NOT_FOUND");

    let (status, body) = post(&router, "/no-such-order", json!({"event": "build"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
}
