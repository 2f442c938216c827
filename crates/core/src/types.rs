use std::fmt;

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A monitored sensor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Temperature,
    Humidity,
}

impl Parameter {
    /// Every monitored parameter, in evaluation order.
    pub const ALL: [Parameter; 2] = [Parameter::Temperature, Parameter::Humidity];

    /// Wire name, as stored in notification bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Humidity => "humidity",
        }
    }

    /// Capitalised name used at the start of notification messages.
    pub fn label(self) -> &'static str {
        match self {
            Parameter::Temperature => "Temperature",
            Parameter::Humidity => "Humidity",
        }
    }

    /// Unit suffix printed after threshold values.
    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Temperature => "°C",
            Parameter::Humidity => "%",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which limit a reading crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachType {
    High,
    Low,
}

impl BreachType {
    pub fn as_str(self) -> &'static str {
        match self {
            BreachType::High => "high",
            BreachType::Low => "low",
        }
    }
}

impl fmt::Display for BreachType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpret a JSON value as a finite number.
///
/// Operators and ingest scripts sometimes store numbers as strings, so
/// numeric strings are accepted too. Anything else yields `None`.
pub fn as_number(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
