use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt;

use whmon_api::config::ServerConfig;
use whmon_api::router::build_app_router;
use whmon_api::state::AppState;
use whmon_monitor::MonitorPhase;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Build the full application router over a monitor phase channel.
///
/// The sender is returned so tests can move the reported phase.
pub fn build_test_app() -> (Router, watch::Sender<MonitorPhase>) {
    let (tx, rx) = watch::channel(MonitorPhase::Idle);
    let state = AppState::new(rx, "memory");
    (build_app_router(state, &test_config()), tx)
}

/// Send a GET request to `uri`.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect the response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
