//! Exactly-once notification emission.

use std::sync::Arc;

use chrono::Utc;
use whmon_core::{BreachCandidate, DedupKey, NewNotification};
use whmon_store::{NotificationSink, StoreError};

use crate::guard::DedupGuard;
use crate::locks::KeyedLocks;

/// What [`NotificationEmitter::emit`] did with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Persisted under the returned key.
    Emitted(String),
    /// A notification for the same breach event already exists.
    Duplicate,
}

/// Persists breach candidates, at most once per [`DedupKey`].
///
/// The guard lookup and the append run under a per-key lock, so concurrent
/// evaluations of the same reading cannot both pass the check.
pub struct NotificationEmitter {
    sink: Arc<dyn NotificationSink>,
    guard: Arc<dyn DedupGuard>,
    locks: KeyedLocks<DedupKey>,
    path: String,
}

impl NotificationEmitter {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        guard: Arc<dyn DedupGuard>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            guard,
            locks: KeyedLocks::new(),
            path: path.into(),
        }
    }

    /// Check, persist and record one candidate.
    ///
    /// A failed lookup emits nothing. A failed append records nothing, so
    /// the same event is retried on the next reading change.
    pub async fn emit(&self, candidate: &BreachCandidate) -> Result<EmitOutcome, StoreError> {
        let key = DedupKey::from(candidate);
        let _lock = self.locks.lock(key.clone()).await;

        if !self.guard.should_emit(&key).await? {
            tracing::debug!(key = %key, guard = self.guard.name(), "Duplicate breach suppressed");
            return Ok(EmitOutcome::Duplicate);
        }

        let notification = NewNotification::from_candidate(candidate, Utc::now());
        let id = self.sink.append(&self.path, &notification).await?;
        self.guard.record_emitted(&key);

        tracing::info!(
            notification_id = %id,
            parameter = %candidate.parameter,
            breach_type = %candidate.breach_type,
            value = candidate.value,
            data_timestamp = %candidate.data_timestamp,
            "Breach notification emitted",
        );
        Ok(EmitOutcome::Emitted(id))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
