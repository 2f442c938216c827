//! Deduplication guards.
//!
//! A guard answers one question: has a notification for this
//! [`DedupKey`] already been emitted? [`MemoryGuard`] remembers keys for
//! the lifetime of the process. [`SinkGuard`] asks the notification sink,
//! so the answer survives restarts; it also remembers the keys it emitted
//! itself, which covers sinks whose query index lags behind their writes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use whmon_core::DedupKey;
use whmon_store::{NotificationSink, StoreError};

/// Field the durable lookup filters on.
const LOOKUP_FIELD: &str = "dataTimestamp";

#[async_trait]
pub trait DedupGuard: Send + Sync {
    /// `true` when no notification for `key` is known yet.
    async fn should_emit(&self, key: &DedupKey) -> Result<bool, StoreError>;

    /// Record that a notification for `key` was persisted.
    fn record_emitted(&self, key: &DedupKey);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Process-lifetime set of emitted keys.
#[derive(Default)]
pub struct MemoryGuard {
    seen: Mutex<HashSet<DedupKey>>,
}

impl MemoryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn seen(&self) -> MutexGuard<'_, HashSet<DedupKey>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen().contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DedupGuard for MemoryGuard {
    async fn should_emit(&self, key: &DedupKey) -> Result<bool, StoreError> {
        Ok(!self.contains(key))
    }

    fn record_emitted(&self, key: &DedupKey) {
        self.seen().insert(key.clone());
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Guard backed by the notifications already in the sink.
pub struct SinkGuard {
    sink: Arc<dyn NotificationSink>,
    path: String,
    limit: usize,
    emitted: MemoryGuard,
}

impl SinkGuard {
    pub fn new(sink: Arc<dyn NotificationSink>, path: impl Into<String>, limit: usize) -> Self {
        Self {
            sink,
            path: path.into(),
            limit,
            emitted: MemoryGuard::new(),
        }
    }
}

#[async_trait]
impl DedupGuard for SinkGuard {
    async fn should_emit(&self, key: &DedupKey) -> Result<bool, StoreError> {
        if self.emitted.contains(key) {
            return Ok(false);
        }

        let existing = self
            .sink
            .query_by_field(
                &self.path,
                LOOKUP_FIELD,
                &serde_json::Value::String(key.data_timestamp.clone()),
                self.limit,
            )
            .await?;

        if existing.iter().any(|entry| entry.dedup_key().as_ref() == Some(key)) {
            tracing::debug!(key = %key, "Notification already present in sink");
            self.emitted.record_emitted(key);
            return Ok(false);
        }
        Ok(true)
    }

    fn record_emitted(&self, key: &DedupKey) {
        self.emitted.record_emitted(key);
    }

    fn name(&self) -> &'static str {
        "durable"
    }
}
