use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use whmon_api::config::{AppConfig, StoreConfig};
use whmon_api::logging;
use whmon_api::router::build_app_router;
use whmon_api::state::AppState;
use whmon_monitor::Monitor;
use whmon_store::{FirebaseStore, MemoryStore, NotificationSink, ReadingStore, ThresholdStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Tracing is not up yet; LOG_FORMAT may be the broken variable.
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // --- Tracing ---
    logging::init(config.log_format);
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        store = config.store.backend_name(),
        "Loaded configuration",
    );

    // --- Store ---
    let (thresholds, readings, sink) = match &config.store {
        StoreConfig::Firebase(firebase) => match FirebaseStore::new(firebase) {
            Ok(store) => collaborators(store),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create realtime database client");
                std::process::exit(1);
            }
        },
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            collaborators(MemoryStore::new())
        }
    };

    // --- Monitor ---
    let monitor = Monitor::new(config.monitor.clone(), thresholds, readings, sink);
    let monitor_handle = match monitor.start(CancellationToken::new()).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start breach monitor");
            std::process::exit(1);
        }
    };
    tracing::info!("Breach monitor started");

    // --- Router ---
    let state = AppState::new(monitor_handle.phase(), config.store.backend_name());
    let app = build_app_router(state, &config.server);

    // --- Start server ---
    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(host = %config.server.host, error = %e, "Invalid HOST");
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Starting server");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    tracing::info!("Server stopped, shutting down breach monitor");
    monitor_handle
        .shutdown(Duration::from_secs(config.server.shutdown_timeout_secs))
        .await;
    tracing::info!("Shutdown complete");
}

/// One store serving as threshold store, reading store and notification sink.
fn collaborators<S>(
    store: S,
) -> (
    Arc<dyn ThresholdStore>,
    Arc<dyn ReadingStore>,
    Arc<dyn NotificationSink>,
)
where
    S: ThresholdStore + ReadingStore + NotificationSink + 'static,
{
    let store = Arc::new(store);
    (store.clone(), store.clone(), store)
}

/// Resolves when the process receives a shutdown signal.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
