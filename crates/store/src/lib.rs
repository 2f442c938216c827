//! Store collaborators for the warehouse monitor.
//!
//! The monitor talks to three collaborators through traits defined in
//! [`traits`]:
//!
//! - [`ThresholdStore`]: current threshold set, read + subscribe.
//! - [`ReadingStore`]: timestamp-keyed reading log, read + subscribe.
//! - [`NotificationSink`]: append-only notification log with field queries.
//!
//! Two backends implement all three:
//!
//! - [`FirebaseStore`]: Firebase Realtime Database over its REST protocol,
//!   with server-sent-event subscriptions and reconnect backoff.
//! - [`MemoryStore`]: in-process store for tests and local runs.
//!
//! Subscriptions are delivered as [`Subscription`] values: channel-backed,
//! lazy sequences of full snapshots that cancel their listener on drop.

mod decode;
pub mod error;
pub mod firebase;
pub mod memory;
pub mod subscription;
pub mod traits;

pub use error::StoreError;
pub use firebase::{FirebaseConfig, FirebaseStore};
pub use memory::MemoryStore;
pub use subscription::Subscription;
pub use traits::{NotificationSink, ReadingStore, ThresholdStore};
