//! Snapshot decoding shared by the backends.
//!
//! Malformed snapshots are logged and treated as absent so a bad write by an
//! operator or the ingest process never reaches the monitor as an error.

use whmon_core::{ReadingLog, ThresholdSet};

pub(crate) fn thresholds(path: &str, value: &serde_json::Value) -> Option<ThresholdSet> {
    match ThresholdSet::from_snapshot(value) {
        Ok(Some(set)) => Some(set),
        Ok(None) => {
            tracing::debug!(path, "No thresholds configured");
            None
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Skipping malformed threshold snapshot");
            None
        }
    }
}

pub(crate) fn readings(path: &str, value: &serde_json::Value) -> Option<ReadingLog> {
    match ReadingLog::from_snapshot(value) {
        Ok(log) => Some(log),
        Err(e) => {
            tracing::warn!(path, error = %e, "Skipping malformed reading snapshot");
            None
        }
    }
}

pub(crate) fn notifications(
    path: &str,
    entries: impl IntoIterator<Item = (String, serde_json::Value)>,
) -> Vec<whmon_core::Notification> {
    entries
        .into_iter()
        .filter_map(|(key, value)| match whmon_core::Notification::from_entry(&key, &value) {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(path, key = %key, error = %e, "Skipping undecodable notification");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_thresholds_are_absent() {
        assert!(thresholds("/t", &json!({"tempHigh": 1})).is_none());
        assert!(thresholds("/t", &json!(null)).is_none());
        assert!(thresholds(
            "/t",
            &json!({"tempHigh": 30, "tempLow": 10, "humHigh": 80, "humLow": 20})
        )
        .is_some());
    }

    #[test]
    fn null_readings_are_an_empty_log() {
        assert_eq!(readings("/r", &json!(null)).map(|l| l.len()), Some(0));
        assert!(readings("/r", &json!(5)).is_none());
    }

    #[test]
    fn undecodable_notifications_are_skipped() {
        let entries = vec![
            ("a".to_string(), json!({"type": "other"})),
            (
                "b".to_string(),
                json!({
                    "type": "threshold_breach", "parameter": "humidity", "breachType": "low",
                    "value": 1, "dataTimestamp": "t", "message": "m",
                    "createdAt": "2024-01-01T00:00:00Z"
                }),
            ),
        ];
        let decoded = notifications("/n", entries);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "b");
    }
}
