use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use whmon_monitor::MonitorPhase;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Seconds since startup.
    pub uptime: f64,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Current phase of the breach monitor.
    pub monitor: MonitorPhase,
    /// Configured store backend.
    pub store: &'static str,
}

/// GET /health -- liveness plus monitor phase.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let monitor = *state.monitor.borrow();

    Json(HealthResponse {
        status: "healthy",
        uptime: state.started_at.elapsed().as_secs_f64(),
        version: env!("CARGO_PKG_VERSION"),
        monitor,
        store: state.store_backend,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
