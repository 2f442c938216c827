use whmon_core::CoreError;
use whmon_store::StoreError;

/// Errors raised by the monitor.
///
/// Only [`MonitorError::Startup`] is fatal; the others end a single
/// evaluation cycle and are logged by the event loop.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A subscription could not be established at startup.
    #[error("Failed to subscribe to {store} at {path}: {source}")]
    Startup {
        store: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    /// A read or write against a store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
