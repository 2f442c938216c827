//! Breach evaluation.
//!
//! [`evaluate`] is a pure function: it compares one [`Reading`] against one
//! [`ThresholdSet`] and returns a [`BreachCandidate`] for every parameter
//! whose value lies strictly outside its limits. Values equal to a limit are
//! in range.

use serde::Serialize;

use crate::reading::Reading;
use crate::threshold::{Limits, ThresholdSet};
use crate::types::{BreachType, Parameter};

/// A breach detected in a reading, not yet checked for duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachCandidate {
    pub parameter: Parameter,
    pub breach_type: BreachType,
    /// The measured value that crossed the limit.
    pub value: f64,
    /// Timestamp of the reading that produced the breach.
    pub data_timestamp: String,
    pub message: String,
}

/// Classify a value against its limits.
pub fn check_breach(value: f64, limits: Limits) -> Option<BreachType> {
    if value > limits.high {
        Some(BreachType::High)
    } else if value < limits.low {
        Some(BreachType::Low)
    } else {
        None
    }
}

/// Human-readable description of a breach.
///
/// `"<Parameter> <above maximum|below minimum> threshold of <limit><unit> at <timestamp>"`
pub fn breach_message(
    parameter: Parameter,
    breach_type: BreachType,
    limits: Limits,
    timestamp: &str,
) -> String {
    let (direction, limit) = match breach_type {
        BreachType::High => ("above maximum", limits.high),
        BreachType::Low => ("below minimum", limits.low),
    };
    format!(
        "{} {direction} threshold of {limit}{} at {timestamp}",
        parameter.label(),
        parameter.unit(),
    )
}

/// Evaluate a reading against a threshold set.
///
/// Candidates come out in [`Parameter::ALL`] order (temperature, then
/// humidity). An in-range reading yields an empty vector.
pub fn evaluate(reading: &Reading, thresholds: &ThresholdSet) -> Vec<BreachCandidate> {
    Parameter::ALL
        .into_iter()
        .filter_map(|parameter| {
            let value = match parameter {
                Parameter::Temperature => reading.temperature,
                Parameter::Humidity => reading.humidity,
            };
            let limits = thresholds.limits(parameter);
            let breach_type = check_breach(value, limits)?;

            Some(BreachCandidate {
                parameter,
                breach_type,
                value,
                data_timestamp: reading.timestamp.clone(),
                message: breach_message(parameter, breach_type, limits, &reading.timestamp),
            })
        })
        .collect()
}
