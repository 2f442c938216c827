use std::fmt;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;
use whmon_core::{Reading, ThresholdSet, Timestamp};

/// Thresholds in force, as seen by evaluation tasks.
///
/// Snapshots are immutable and shared behind an `Arc`: a threshold update
/// replaces the snapshot, it never edits one an evaluation is reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSnapshot {
    pub thresholds: ThresholdSet,
    /// Logical update time: the stored `updatedAt` when present, otherwise
    /// the time the change was received.
    pub updated_at: Timestamp,
    /// Monotonic counter, one per observed update.
    pub version: u64,
}

impl ThresholdSnapshot {
    pub fn observe(thresholds: ThresholdSet, received_at: Timestamp, version: u64) -> Self {
        let updated_at = thresholds.updated_at.unwrap_or(received_at);
        Self {
            thresholds,
            updated_at,
            version,
        }
    }

    /// A reading taken at or before the last threshold update is stale.
    ///
    /// Unparseable reading timestamps fall back to a lexical comparison
    /// with the update time in RFC 3339 form.
    pub fn is_stale(&self, reading: &Reading) -> bool {
        match reading.time() {
            Some(taken) => taken <= self.updated_at,
            None => {
                let updated = self.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true);
                reading.timestamp.as_str() <= updated.as_str()
            }
        }
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Default)]
pub enum MonitorState {
    /// No thresholds observed yet; reading changes are ignored.
    #[default]
    Idle,
    /// Thresholds cached; reading changes are evaluated.
    Armed(Arc<ThresholdSnapshot>),
}

impl MonitorState {
    pub fn snapshot(&self) -> Option<Arc<ThresholdSnapshot>> {
        match self {
            MonitorState::Idle => None,
            MonitorState::Armed(snapshot) => Some(Arc::clone(snapshot)),
        }
    }
}

/// Externally visible phase, published on a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    #[default]
    Idle,
    Armed,
    /// At least one evaluation task is in flight.
    Evaluating,
    Stopped,
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorPhase::Idle => "idle",
            MonitorPhase::Armed => "armed",
            MonitorPhase::Evaluating => "evaluating",
            MonitorPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn snapshot_updated_at(h: u32) -> ThresholdSnapshot {
        let set = ThresholdSet::new(30.0, 10.0, 80.0, 20.0).with_updated_at(at(h));
        ThresholdSnapshot::observe(set, at(23), 1)
    }

    #[test]
    fn stored_update_time_wins_over_receipt_time() {
        assert_eq!(snapshot_updated_at(6).updated_at, at(6));
    }

    #[test]
    fn receipt_time_is_used_without_stored_update_time() {
        let s = ThresholdSnapshot::observe(ThresholdSet::new(30.0, 10.0, 80.0, 20.0), at(4), 1);
        assert_eq!(s.updated_at, at(4));
    }

    #[test]
    fn older_and_equal_readings_are_stale() {
        let s = snapshot_updated_at(6);
        assert!(s.is_stale(&Reading::new("2024-01-01T05:00:00", 35.0, 50.0)));
        assert!(s.is_stale(&Reading::new("2024-01-01T06:00:00", 35.0, 50.0)));
        assert!(!s.is_stale(&Reading::new("2024-01-01T06:00:01", 35.0, 50.0)));
    }

    #[test]
    fn unparseable_timestamps_compare_lexically() {
        let s = snapshot_updated_at(6);
        assert!(s.is_stale(&Reading::new("2023-garbage", 35.0, 50.0)));
        assert!(!s.is_stale(&Reading::new("2025-garbage", 35.0, 50.0)));
    }

    #[test]
    fn idle_state_has_no_snapshot() {
        assert!(MonitorState::default().snapshot().is_none());
        let armed = MonitorState::Armed(Arc::new(snapshot_updated_at(6)));
        assert_eq!(armed.snapshot().map(|s| s.version), Some(1));
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(MonitorPhase::Evaluating).unwrap(),
            serde_json::json!("evaluating")
        );
    }
}
