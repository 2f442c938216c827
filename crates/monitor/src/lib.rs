//! Threshold-breach monitoring engine.
//!
//! [`Monitor`] subscribes to the threshold and reading stores, caches the
//! latest threshold snapshot, evaluates the most recent reading on every
//! reading change and persists one notification per unique breach event.
//!
//! - [`guard`]: deduplication guards (in-memory and sink-backed).
//! - [`locks`]: per-key async locks serialising check-then-persist.
//! - [`emitter`]: guard + lock + sink, the exactly-once emission path.
//! - [`evaluation`]: one reading event against one threshold snapshot.
//! - [`state`]: the orchestrator's state machine types.
//! - [`orchestrator`]: subscriptions, event loop and lifecycle.

pub mod config;
pub mod emitter;
pub mod error;
pub mod evaluation;
pub mod guard;
pub mod locks;
pub mod orchestrator;
pub mod state;

pub use config::{DedupStrategy, MonitorConfig};
pub use emitter::{EmitOutcome, NotificationEmitter};
pub use evaluation::Evaluator;
pub use error::MonitorError;
pub use guard::{DedupGuard, MemoryGuard, SinkGuard};
pub use orchestrator::{Monitor, MonitorHandle};
pub use state::{MonitorPhase, MonitorState, ThresholdSnapshot};
