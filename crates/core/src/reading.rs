//! Sensor readings and the timestamp-keyed reading log.
//!
//! Readings are written by the ingest process as children of
//! [`READINGS_PATH`](crate::paths::READINGS_PATH), keyed by timestamp. The
//! monitor only ever evaluates the most recent one.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timestamp::{normalize_key, parse_timestamp};
use crate::types::{as_number, Timestamp};

/// A single temperature/humidity reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the reading was taken, as written by the ingest process.
    #[serde(rename = "createdAt_time")]
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl Reading {
    pub fn new(timestamp: impl Into<String>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            temperature,
            humidity,
        }
    }

    /// Decode a stored log entry.
    ///
    /// The timestamp comes from `createdAt_time` when present, otherwise from
    /// the entry key. Missing or non-numeric measurements are malformed.
    pub fn from_entry(key: &str, value: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::Malformed(format!("reading {key} is not an object")))?;

        let timestamp = match obj.get("createdAt_time").and_then(|v| v.as_str()) {
            Some(ts) if !ts.trim().is_empty() => ts.to_string(),
            _ => normalize_key(key),
        };

        let measurement = |field: &str| {
            obj.get(field).and_then(as_number).ok_or_else(|| {
                CoreError::Malformed(format!("reading {key} has no numeric {field}"))
            })
        };

        Ok(Self {
            timestamp,
            temperature: measurement("temperature")?,
            humidity: measurement("humidity")?,
        })
    }

    /// Parsed reading time, if the timestamp is in a recognised format.
    pub fn time(&self) -> Option<Timestamp> {
        parse_timestamp(&self.timestamp)
    }
}

/// Full snapshot of the reading collection.
///
/// Entries are kept as raw JSON so that one malformed reading does not make
/// the whole snapshot unreadable; they are decoded on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingLog {
    entries: BTreeMap<String, serde_json::Value>,
}

impl ReadingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a store snapshot. `null` (no readings yet) is an empty log.
    pub fn from_snapshot(value: &serde_json::Value) -> Result<Self, CoreError> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(map) => Ok(Self {
                entries: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            }),
            other => Err(CoreError::Malformed(format!(
                "reading collection must be an object, got {other}"
            ))),
        }
    }

    /// Store a reading under `key` in its persisted shape.
    pub fn insert(&mut self, key: impl Into<String>, reading: &Reading) {
        let value = serde_json::to_value(reading).unwrap_or(serde_json::Value::Null);
        self.entries.insert(key.into(), value);
    }

    /// Store a raw entry, e.g. one with missing fields.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the most recent entry.
    ///
    /// Keys that parse as timestamps order temporally and rank above keys
    /// that do not; ties fall back to lexical order of the raw key.
    pub fn latest_key(&self) -> Option<&str> {
        self.entries
            .keys()
            .map(|k| (parse_timestamp(k), k.as_str()))
            .max_by(|a, b| compare_keys(a, b))
            .map(|(_, k)| k)
    }

    /// Decode the most recent entry.
    ///
    /// Returns `None` for an empty log. A malformed latest entry is an error;
    /// older entries are never used in its place.
    pub fn latest(&self) -> Option<Result<Reading, CoreError>> {
        let key = self.latest_key()?;
        let value = self.entries.get(key)?;
        Some(Reading::from_entry(key, value))
    }

    /// Serialise back into the stored object shape.
    pub fn to_snapshot(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

fn compare_keys(a: &(Option<Timestamp>, &str), b: &(Option<Timestamp>, &str)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn from_entry_prefers_created_at_time() {
        let value = json!({"createdAt_time": "2024-01-01T00:00:05", "temperature": 21.0, "humidity": 40});
        let reading = Reading::from_entry("2024-01-01_00:00:00", &value).unwrap();
        assert_eq!(reading.timestamp, "2024-01-01T00:00:05");
        assert_eq!(reading.temperature, 21.0);
        assert_eq!(reading.humidity, 40.0);
    }

    #[test]
    fn from_entry_falls_back_to_key() {
        let value = json!({"temperature": "22.5", "humidity": 41});
        let reading = Reading::from_entry("2024-01-01_00:00:00", &value).unwrap();
        assert_eq!(reading.timestamp, "2024-01-01T00:00:00");
        assert_eq!(reading.temperature, 22.5);
    }

    #[test]
    fn from_entry_missing_measurement_is_malformed() {
        let value = json!({"createdAt_time": "2024-01-01T00:00:00", "temperature": 20});
        assert_matches!(
            Reading::from_entry("k", &value),
            Err(CoreError::Malformed(msg)) if msg.contains("humidity")
        );
    }

    #[test]
    fn from_entry_non_object_is_malformed() {
        assert_matches!(Reading::from_entry("k", &json!(12)), Err(CoreError::Malformed(_)));
    }

    #[test]
    fn snapshot_null_is_empty_log() {
        let log = ReadingLog::from_snapshot(&json!(null)).unwrap();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }

    #[test]
    fn snapshot_scalar_is_malformed() {
        assert_matches!(ReadingLog::from_snapshot(&json!("x")), Err(CoreError::Malformed(_)));
    }

    #[test]
    fn latest_orders_by_time_not_insertion() {
        let mut log = ReadingLog::new();
        log.insert("2024-01-02_00:00:00", &Reading::new("2024-01-02T00:00:00", 20.0, 50.0));
        log.insert("2024-01-03_00:00:00", &Reading::new("2024-01-03T00:00:00", 21.0, 50.0));
        log.insert("2024-01-01_00:00:00", &Reading::new("2024-01-01T00:00:00", 22.0, 50.0));

        assert_eq!(log.latest_key(), Some("2024-01-03_00:00:00"));
        assert_eq!(log.latest().unwrap().unwrap().temperature, 21.0);
    }

    #[test]
    fn latest_compares_mixed_separators_temporally() {
        let mut log = ReadingLog::new();
        log.insert("2024-01-01T10:00:00", &Reading::new("2024-01-01T10:00:00", 20.0, 50.0));
        log.insert("2024-01-01_09:00:00", &Reading::new("2024-01-01T09:00:00", 21.0, 50.0));
        assert_eq!(log.latest_key(), Some("2024-01-01T10:00:00"));
    }

    #[test]
    fn parseable_keys_rank_above_unparseable() {
        let mut log = ReadingLog::new();
        log.insert("zzz", &Reading::new("zzz", 20.0, 50.0));
        log.insert("2024-01-01_00:00:00", &Reading::new("2024-01-01T00:00:00", 21.0, 50.0));
        assert_eq!(log.latest_key(), Some("2024-01-01_00:00:00"));
    }

    #[test]
    fn malformed_latest_does_not_fall_back() {
        let mut log = ReadingLog::new();
        log.insert("2024-01-01_00:00:00", &Reading::new("2024-01-01T00:00:00", 21.0, 50.0));
        log.insert_raw("2024-01-02_00:00:00", json!({"temperature": 20}));
        assert_matches!(log.latest(), Some(Err(CoreError::Malformed(_))));
    }

    #[test]
    fn snapshot_round_trips_stored_shape() {
        let mut log = ReadingLog::new();
        log.insert("2024-01-01_00:00:00", &Reading::new("2024-01-01T00:00:00", 21.0, 50.0));
        let snapshot = log.to_snapshot();
        assert_eq!(
            snapshot["2024-01-01_00:00:00"]["createdAt_time"],
            "2024-01-01T00:00:00"
        );
        assert_eq!(ReadingLog::from_snapshot(&snapshot).unwrap(), log);
    }
}
