use std::fmt;
use std::str::FromStr;

use whmon_core::paths::{NOTIFICATIONS_PATH, READINGS_PATH, THRESHOLDS_PATH};

/// Default number of notifications fetched by a durable dedup lookup.
pub const DEFAULT_DEDUP_QUERY_LIMIT: usize = 50;

/// How the monitor decides a breach was already notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Look the key up in the notification sink (survives restarts).
    Durable,
    /// Remember keys for the process lifetime only. A restart can re-emit
    /// notifications for breaches observed again afterwards.
    Memory,
}

impl FromStr for DedupStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "durable" | "sink" => Ok(DedupStrategy::Durable),
            "memory" | "in-memory" => Ok(DedupStrategy::Memory),
            other => Err(format!("unknown dedup strategy '{other}' (expected durable or memory)")),
        }
    }
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupStrategy::Durable => f.write_str("durable"),
            DedupStrategy::Memory => f.write_str("memory"),
        }
    }
}

/// Monitor settings. Paths default to the well-known warehouse layout.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub thresholds_path: String,
    pub readings_path: String,
    pub notifications_path: String,
    /// Skip readings not newer than the last threshold update.
    pub staleness_filter: bool,
    pub dedup_strategy: DedupStrategy,
    /// Result limit for durable dedup lookups.
    pub dedup_query_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds_path: THRESHOLDS_PATH.to_string(),
            readings_path: READINGS_PATH.to_string(),
            notifications_path: NOTIFICATIONS_PATH.to_string(),
            staleness_filter: true,
            dedup_strategy: DedupStrategy::Durable,
            dedup_query_limit: DEFAULT_DEDUP_QUERY_LIMIT,
        }
    }
}
