//! Identity of a breach event for deduplication.

use std::fmt;

use serde::Deserialize;

use crate::breach::BreachCandidate;
use crate::notification::{NewNotification, NOTIFICATION_TYPE_THRESHOLD_BREACH};
use crate::types::{BreachType, Parameter};

/// `(type, parameter, breachType, dataTimestamp)`.
///
/// The measured value and the message are derived from the reading and the
/// limits, so they are left out: two candidates for the same reading and the
/// same crossed limit are the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub kind: String,
    pub parameter: Parameter,
    pub breach_type: BreachType,
    pub data_timestamp: String,
}

impl DedupKey {
    pub fn for_candidate(candidate: &BreachCandidate) -> Self {
        Self {
            kind: NOTIFICATION_TYPE_THRESHOLD_BREACH.to_string(),
            parameter: candidate.parameter,
            breach_type: candidate.breach_type,
            data_timestamp: candidate.data_timestamp.clone(),
        }
    }

    pub fn for_notification(notification: &NewNotification) -> Self {
        Self {
            kind: notification.kind.clone(),
            parameter: notification.parameter,
            breach_type: notification.breach_type,
            data_timestamp: notification.data_timestamp.clone(),
        }
    }
}

impl DedupKey {
    /// Read the key fields of a stored notification.
    ///
    /// Only `type`, `parameter`, `breachType` and `dataTimestamp` are
    /// inspected, so records written in any other body shape still match.
    /// `None` when one of them is missing or unrecognised.
    pub fn from_stored(value: &serde_json::Value) -> Option<Self> {
        let text = |field: &str| value.get(field).and_then(|v| v.as_str());
        Some(Self {
            kind: text("type")?.to_string(),
            parameter: Parameter::deserialize(value.get("parameter")?).ok()?,
            breach_type: BreachType::deserialize(value.get("breachType")?).ok()?,
            data_timestamp: text("dataTimestamp")?.to_string(),
        })
    }
}

impl From<&BreachCandidate> for DedupKey {
    fn from(candidate: &BreachCandidate) -> Self {
        Self::for_candidate(candidate)
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.kind, self.parameter, self.breach_type, self.data_timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(value: f64, message: &str) -> BreachCandidate {
        BreachCandidate {
            parameter: Parameter::Temperature,
            breach_type: BreachType::High,
            value,
            data_timestamp: "2024-01-01T00:00:00".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn value_and_message_do_not_affect_key() {
        let a = DedupKey::from(&candidate(35.0, "first"));
        let b = DedupKey::from(&candidate(36.5, "second"));
        assert_eq!(a, b);
    }

    #[test]
    fn breach_type_distinguishes_keys() {
        let high = candidate(35.0, "m");
        let mut low = high.clone();
        low.breach_type = BreachType::Low;
        assert_ne!(DedupKey::from(&high), DedupKey::from(&low));
    }

    #[test]
    fn stored_key_ignores_body_shape() {
        let stored = serde_json::json!({
            "type": "threshold_breach",
            "parameter": "temperature",
            "breachType": "high",
            "dataTimestamp": "2024-01-01T00:00:00",
            "value": 35,
            "message": "Temperature above maximum threshold of 30°C at 2024-01-01T00:00:00",
            "readBy": {},
            "timestamp": "2024-01-01T00:00:02.000Z"
        });
        assert_eq!(
            DedupKey::from_stored(&stored),
            Some(DedupKey::from(&candidate(35.0, "m")))
        );
    }

    #[test]
    fn stored_key_requires_all_key_fields() {
        let stored = serde_json::json!({
            "type": "threshold_breach",
            "parameter": "temperature",
            "dataTimestamp": "2024-01-01T00:00:00"
        });
        assert_eq!(DedupKey::from_stored(&stored), None);
        let unknown = serde_json::json!({
            "type": "threshold_breach",
            "parameter": "pressure",
            "breachType": "high",
            "dataTimestamp": "2024-01-01T00:00:00"
        });
        assert_eq!(DedupKey::from_stored(&unknown), None);
    }

    #[test]
    fn display_is_colon_separated() {
        let key = DedupKey::from(&candidate(35.0, "m"));
        assert_eq!(
            key.to_string(),
            "threshold_breach:temperature:high:2024-01-01T00:00:00"
        );
    }
}
