//! Operator-configured high/low limits.

use serde::Serialize;

use crate::error::CoreError;
use crate::timestamp::parse_timestamp;
use crate::types::{as_number, Parameter, Timestamp};

/// High/low limits for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub high: f64,
    pub low: f64,
}

/// The threshold object stored at [`THRESHOLDS_PATH`](crate::paths::THRESHOLDS_PATH).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSet {
    #[serde(rename = "tempHighThreshold")]
    pub temp_high: f64,
    #[serde(rename = "tempLowThreshold")]
    pub temp_low: f64,
    #[serde(rename = "humHighThreshold")]
    pub hum_high: f64,
    #[serde(rename = "humLowThreshold")]
    pub hum_low: f64,
    /// Logical version written by the operator tooling, when it provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// Accepted spellings for each field, stored name first.
const TEMP_HIGH: [&str; 2] = ["tempHighThreshold", "tempHigh"];
const TEMP_LOW: [&str; 2] = ["tempLowThreshold", "tempLow"];
const HUM_HIGH: [&str; 2] = ["humHighThreshold", "humHigh"];
const HUM_LOW: [&str; 2] = ["humLowThreshold", "humLow"];

impl ThresholdSet {
    pub fn new(temp_high: f64, temp_low: f64, hum_high: f64, hum_low: f64) -> Self {
        Self {
            temp_high,
            temp_low,
            hum_high,
            hum_low,
            updated_at: None,
        }
    }

    /// Attach a logical update time.
    pub fn with_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Decode a store snapshot.
    ///
    /// `null` means no thresholds have been configured yet and yields
    /// `Ok(None)`. An object missing any limit, or holding a non-numeric
    /// limit, is malformed. An unparseable `updatedAt` is ignored.
    pub fn from_snapshot(value: &serde_json::Value) -> Result<Option<Self>, CoreError> {
        let obj = match value {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Object(obj) => obj,
            other => {
                return Err(CoreError::Malformed(format!(
                    "thresholds must be an object, got {other}"
                )))
            }
        };

        let limit = |names: [&str; 2]| {
            names
                .iter()
                .find_map(|name| obj.get(*name))
                .and_then(as_number)
                .ok_or_else(|| CoreError::Malformed(format!("thresholds have no numeric {}", names[0])))
        };

        let updated_at = obj
            .get("updatedAt")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp);

        Ok(Some(Self {
            temp_high: limit(TEMP_HIGH)?,
            temp_low: limit(TEMP_LOW)?,
            hum_high: limit(HUM_HIGH)?,
            hum_low: limit(HUM_LOW)?,
            updated_at,
        }))
    }

    /// Limits for a single parameter.
    pub fn limits(&self, parameter: Parameter) -> Limits {
        match parameter {
            Parameter::Temperature => Limits {
                high: self.temp_high,
                low: self.temp_low,
            },
            Parameter::Humidity => Limits {
                high: self.hum_high,
                low: self.hum_low,
            },
        }
    }

    /// Check that every limit is finite and no low limit exceeds its high.
    pub fn validate(&self) -> Result<(), CoreError> {
        for parameter in Parameter::ALL {
            let Limits { high, low } = self.limits(parameter);
            if !high.is_finite() || !low.is_finite() {
                return Err(CoreError::Validation(format!(
                    "{parameter} limits must be finite"
                )));
            }
            if low > high {
                return Err(CoreError::Validation(format!(
                    "{parameter} low limit {low} exceeds high limit {high}"
                )));
            }
        }
        Ok(())
    }
}
