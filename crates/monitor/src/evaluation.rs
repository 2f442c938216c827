//! One reading event against one threshold snapshot.

use std::sync::Arc;

use whmon_core::{evaluate, ReadingLog};

use crate::emitter::{EmitOutcome, NotificationEmitter};
use crate::error::MonitorError;
use crate::state::ThresholdSnapshot;

/// Runs evaluation cycles. Shared by every spawned evaluation task.
pub struct Evaluator {
    emitter: NotificationEmitter,
    staleness_filter: bool,
}

impl Evaluator {
    pub fn new(emitter: NotificationEmitter, staleness_filter: bool) -> Self {
        Self {
            emitter,
            staleness_filter,
        }
    }

    /// Evaluate the latest reading in `log` and emit its breaches.
    ///
    /// Returns the keys of the notifications written in this cycle. An empty
    /// log, a malformed latest entry and a stale reading all end the cycle
    /// without emitting. Every candidate is attempted even when an earlier
    /// one fails; the first failure is returned afterwards.
    pub async fn process(
        &self,
        snapshot: Arc<ThresholdSnapshot>,
        log: ReadingLog,
    ) -> Result<Vec<String>, MonitorError> {
        let reading = match log.latest() {
            None => {
                tracing::debug!("Reading collection is empty");
                return Ok(Vec::new());
            }
            Some(Err(e)) => {
                tracing::warn!(
                    key = log.latest_key().unwrap_or_default(),
                    error = %e,
                    "Skipping malformed latest reading",
                );
                return Ok(Vec::new());
            }
            Some(Ok(reading)) => reading,
        };

        if self.staleness_filter && snapshot.is_stale(&reading) {
            tracing::info!(
                data_timestamp = %reading.timestamp,
                thresholds_updated_at = %snapshot.updated_at,
                "Skipping reading not newer than thresholds",
            );
            return Ok(Vec::new());
        }

        let candidates = evaluate(&reading, &snapshot.thresholds);
        tracing::debug!(
            data_timestamp = %reading.timestamp,
            temperature = reading.temperature,
            humidity = reading.humidity,
            thresholds_version = snapshot.version,
            breaches = candidates.len(),
            "Reading evaluated",
        );

        let mut emitted = Vec::new();
        let mut first_error = None;
        for candidate in &candidates {
            match self.emitter.emit(candidate).await {
                Ok(EmitOutcome::Emitted(id)) => emitted.push(id),
                Ok(EmitOutcome::Duplicate) => {}
                Err(e) => {
                    tracing::warn!(
                        parameter = %candidate.parameter,
                        breach_type = %candidate.breach_type,
                        data_timestamp = %candidate.data_timestamp,
                        error = %e,
                        "Failed to emit breach notification",
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(emitted),
        }
    }
}
