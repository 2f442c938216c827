//! Domain types and pure logic for the warehouse environmental monitor.
//!
//! - [`reading`]: sensor readings and the timestamp-keyed reading log.
//! - [`threshold`]: operator-configured high/low limits.
//! - [`breach`]: the breach evaluator (reading × thresholds → candidates).
//! - [`notification`]: stored alert notifications.
//! - [`dedup`]: the key that identifies a unique breach event.
//!
//! Nothing in this crate performs I/O; the store and monitor crates build on
//! these types.

pub mod breach;
pub mod dedup;
pub mod error;
pub mod notification;
pub mod paths;
pub mod reading;
pub mod threshold;
pub mod timestamp;
pub mod types;

pub use breach::{evaluate, BreachCandidate};
pub use dedup::DedupKey;
pub use error::CoreError;
pub use notification::{NewNotification, Notification, NotificationEntry};
pub use reading::{Reading, ReadingLog};
pub use threshold::ThresholdSet;
pub use types::{BreachType, Parameter, Timestamp};
