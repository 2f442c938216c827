//! Stored alert notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::breach::BreachCandidate;
use crate::dedup::DedupKey;
use crate::error::CoreError;
use crate::types::{BreachType, Parameter, Timestamp};

/// `type` value of every notification this service writes.
pub const NOTIFICATION_TYPE_THRESHOLD_BREACH: &str = "threshold_breach";

/// Notification body as written to the sink, before a key is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub parameter: Parameter,
    pub breach_type: BreachType,
    pub value: f64,
    pub data_timestamp: String,
    pub message: String,
    /// Older records spell this `timestamp`.
    #[serde(alias = "timestamp")]
    pub created_at: Timestamp,
    /// Reader id → read marker, maintained by the dashboard.
    #[serde(default)]
    pub read_by: BTreeMap<String, serde_json::Value>,
}

impl NewNotification {
    pub fn from_candidate(candidate: &BreachCandidate, created_at: Timestamp) -> Self {
        Self {
            kind: NOTIFICATION_TYPE_THRESHOLD_BREACH.to_string(),
            parameter: candidate.parameter,
            breach_type: candidate.breach_type,
            value: candidate.value,
            data_timestamp: candidate.data_timestamp.clone(),
            message: candidate.message.clone(),
            created_at,
            read_by: BTreeMap::new(),
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::for_notification(self)
    }
}

/// A notification read back from the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Key generated by the sink on append.
    pub id: String,
    #[serde(flatten)]
    pub body: NewNotification,
}

impl Notification {
    /// Decode a stored entry keyed by `id`.
    pub fn from_entry(id: &str, value: &serde_json::Value) -> Result<Self, CoreError> {
        let body = NewNotification::deserialize(value)
            .map_err(|e| CoreError::Malformed(format!("notification {id}: {e}")))?;
        Ok(Self {
            id: id.to_string(),
            body,
        })
    }

    pub fn dedup_key(&self) -> DedupKey {
        self.body.dedup_key()
    }
}

/// A raw entry returned by a sink query.
///
/// Kept undecoded so that deduplication can match on the key fields alone,
/// whatever else the record carries.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEntry {
    pub id: String,
    pub value: serde_json::Value,
}

impl NotificationEntry {
    pub fn new(id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    /// Key of the breach event this record notifies, if it names one.
    pub fn dedup_key(&self) -> Option<DedupKey> {
        DedupKey::from_stored(&self.value)
    }

    pub fn decode(&self) -> Result<Notification, CoreError> {
        Notification::from_entry(&self.id, &self.value)
    }
}
