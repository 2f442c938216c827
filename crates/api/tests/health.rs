//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, get};
use whmon_monitor::MonitorPhase;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_healthy_with_json() {
    let (app, _phase) = common::build_test_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["uptime"].as_f64().is_some_and(|u| u >= 0.0));
    assert!(json["version"].is_string());
    assert_eq!(json["monitor"], "idle");
    assert_eq!(json["store"], "memory");
}

// ---------------------------------------------------------------------------
// Test: health reflects the monitor phase
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_reports_monitor_phase() {
    let (app, phase) = common::build_test_app();
    phase.send_replace(MonitorPhase::Armed);

    let json = body_json(get(app, "/health").await).await;
    assert_eq!(json["monitor"], "armed");
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _phase) = common::build_test_app();
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let (app, _phase) = common::build_test_app();
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    let id_str = request_id.to_str().unwrap();
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}
