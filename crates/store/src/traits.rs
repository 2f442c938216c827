//! Collaborator contracts consumed by the monitor.

use async_trait::async_trait;
use whmon_core::{NewNotification, NotificationEntry, ReadingLog, ThresholdSet};

use crate::error::StoreError;
use crate::subscription::Subscription;

/// Source of the operator-configured threshold set.
#[async_trait]
pub trait ThresholdStore: Send + Sync {
    /// Read the current thresholds. `None` when none are configured or the
    /// stored value is malformed.
    async fn read_thresholds(&self, path: &str) -> Result<Option<ThresholdSet>, StoreError>;

    /// Subscribe to threshold changes.
    ///
    /// The current value is delivered first when one exists. Malformed
    /// snapshots are skipped. An error means the listener could not be
    /// established.
    async fn subscribe_thresholds(
        &self,
        path: &str,
    ) -> Result<Subscription<ThresholdSet>, StoreError>;
}

/// Source of sensor readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn read_readings(&self, path: &str) -> Result<Option<ReadingLog>, StoreError>;

    /// Subscribe to the reading collection. Every item is the full log.
    async fn subscribe_readings(&self, path: &str) -> Result<Subscription<ReadingLog>, StoreError>;
}

/// Durable append-only notification log.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Append a notification and return its generated key.
    async fn append(&self, path: &str, notification: &NewNotification)
        -> Result<String, StoreError>;

    /// Notifications whose `field` equals `value`, ordered by key, keeping the
    /// last `limit` matches. Entries are returned undecoded.
    async fn query_by_field(
        &self,
        path: &str,
        field: &str,
        value: &serde_json::Value,
        limit: usize,
    ) -> Result<Vec<NotificationEntry>, StoreError>;
}
