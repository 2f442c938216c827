//! Well-known store paths.
//!
//! These must match the layout written by the sensor ingest process and read
//! by the operator dashboard.

/// Single threshold object edited by operators.
pub const THRESHOLDS_PATH: &str = "/warehouse/thresholds";

/// Append-only reading log, one child per timestamp key.
pub const READINGS_PATH: &str = "/warehouse/data";

/// Append-only notification log, one child per generated key.
pub const NOTIFICATIONS_PATH: &str = "/warehouse/notifications/general";
