use std::time::Instant;

use tokio::sync::watch;
use whmon_monitor::MonitorPhase;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Process start, for the reported uptime.
    pub started_at: Instant,
    /// Current phase of the breach monitor.
    pub monitor: watch::Receiver<MonitorPhase>,
    /// Name of the configured store backend.
    pub store_backend: &'static str,
}

impl AppState {
    pub fn new(monitor: watch::Receiver<MonitorPhase>, store_backend: &'static str) -> Self {
        Self {
            started_at: Instant::now(),
            monitor,
            store_backend,
        }
    }
}
