//! In-process store backend.
//!
//! [`MemoryStore`] keeps one JSON value per path and fans every change out
//! over a `tokio::sync::broadcast` channel, the same way the realtime
//! database pushes snapshots to its listeners. It is cheap to clone; all
//! clones share the same data.
//!
//! Besides implementing the collaborator traits it exposes write helpers
//! (standing in for the ingest process and the operator dashboard) and
//! [`set_unavailable`](MemoryStore::set_unavailable) to simulate transient
//! store failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use whmon_core::{
    NewNotification, Notification, NotificationEntry, Reading, ReadingLog, ThresholdSet,
};

use crate::decode;
use crate::error::StoreError;
use crate::subscription::{Subscription, SUBSCRIPTION_BUFFER};
use crate::traits::{NotificationSink, ReadingStore, ThresholdStore};

/// Capacity of the change fan-out channel.
const CHANGE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Change {
    path: String,
    value: serde_json::Value,
}

struct Inner {
    nodes: Mutex<HashMap<String, serde_json::Value>>,
    changes: broadcast::Sender<Change>,
    unavailable: AtomicBool,
    next_key: AtomicU64,
}

/// Shared in-memory store. See the module docs.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                nodes: Mutex::new(HashMap::new()),
                changes,
                unavailable: AtomicBool::new(false),
                next_key: AtomicU64::new(0),
            }),
        }
    }

    fn nodes(&self) -> MutexGuard<'_, HashMap<String, serde_json::Value>> {
        self.inner.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, path: &str, value: serde_json::Value) {
        // Zero receivers is fine: nobody is subscribed yet.
        let _ = self.inner.changes.send(Change {
            path: path.to_string(),
            value,
        });
    }

    /// Current value at `path`, `null` when nothing was written.
    pub fn get(&self, path: &str) -> serde_json::Value {
        self.nodes()
            .get(path)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    /// Replace the value at `path` and notify subscribers.
    pub fn set(&self, path: &str, value: serde_json::Value) {
        self.nodes().insert(path.to_string(), value.clone());
        self.publish(path, value);
    }

    /// Insert or replace the child `key` of the object at `path`.
    pub fn set_child(&self, path: &str, key: &str, value: serde_json::Value) {
        let snapshot = {
            let mut nodes = self.nodes();
            let node = nodes
                .entry(path.to_string())
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            if !node.is_object() {
                *node = serde_json::Value::Object(Default::default());
            }
            if let serde_json::Value::Object(map) = node {
                map.insert(key.to_string(), value);
            }
            node.clone()
        };
        self.publish(path, snapshot);
    }

    /// Append a child under a generated, insertion-ordered key.
    pub fn push(&self, path: &str, value: serde_json::Value) -> String {
        let key = self.generate_key();
        self.set_child(path, &key, value);
        key
    }

    /// Re-deliver the current snapshot at `path`, as a store does after a
    /// reconnect or a duplicate change notification.
    pub fn republish(&self, path: &str) {
        let value = self.get(path);
        self.publish(path, value);
    }

    pub fn put_thresholds(&self, path: &str, thresholds: &ThresholdSet) {
        let value = serde_json::to_value(thresholds).unwrap_or(serde_json::Value::Null);
        self.set(path, value);
    }

    pub fn insert_reading(&self, path: &str, key: &str, reading: &Reading) {
        let value = serde_json::to_value(reading).unwrap_or(serde_json::Value::Null);
        self.set_child(path, key, value);
    }

    /// Every decodable notification at `path`, in key order.
    pub fn notifications(&self, path: &str) -> Vec<Notification> {
        decode::notifications(path, self.children(path))
    }

    /// Make every trait operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn children(&self, path: &str) -> Vec<(String, serde_json::Value)> {
        match self.get(path) {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn generate_key(&self) -> String {
        let seq = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{seq:012x}-{}", &suffix[..8])
    }

    fn subscribe_decoded<T>(
        &self,
        path: &str,
        decode: fn(&str, &serde_json::Value) -> Option<T>,
    ) -> Subscription<T>
    where
        T: Send + 'static,
    {
        // Subscribe before reading the current value so no change is missed
        // in between. A change racing the read is delivered twice, which
        // consumers already tolerate.
        let mut changes = self.inner.changes.subscribe();
        let initial = decode(path, &self.get(path));

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let watched = path.to_string();

        let task = tokio::spawn(async move {
            if let Some(item) = initial {
                if tx.send(item).await.is_err() {
                    return;
                }
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) if change.path == watched => {
                            if let Some(item) = decode(&watched, &change.value) {
                                if tx.send(item).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(path = %watched, skipped = n, "Memory subscription lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        Subscription::new(path, rx, cancel, task)
    }
}

#[async_trait]
impl ThresholdStore for MemoryStore {
    async fn read_thresholds(&self, path: &str) -> Result<Option<ThresholdSet>, StoreError> {
        self.check_available()?;
        Ok(decode::thresholds(path, &self.get(path)))
    }

    async fn subscribe_thresholds(
        &self,
        path: &str,
    ) -> Result<Subscription<ThresholdSet>, StoreError> {
        self.check_available()?;
        Ok(self.subscribe_decoded(path, decode::thresholds))
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn read_readings(&self, path: &str) -> Result<Option<ReadingLog>, StoreError> {
        self.check_available()?;
        match self.get(path) {
            serde_json::Value::Null => Ok(None),
            value => Ok(decode::readings(path, &value)),
        }
    }

    async fn subscribe_readings(&self, path: &str) -> Result<Subscription<ReadingLog>, StoreError> {
        self.check_available()?;
        Ok(self.subscribe_decoded(path, decode::readings))
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn append(
        &self,
        path: &str,
        notification: &NewNotification,
    ) -> Result<String, StoreError> {
        self.check_available()?;
        let value = serde_json::to_value(notification)?;
        Ok(self.push(path, value))
    }

    async fn query_by_field(
        &self,
        path: &str,
        field: &str,
        value: &serde_json::Value,
        limit: usize,
    ) -> Result<Vec<NotificationEntry>, StoreError> {
        self.check_available()?;
        let mut matches: Vec<NotificationEntry> = self
            .children(path)
            .into_iter()
            .filter(|(_, entry)| entry.get(field) == Some(value))
            .map(|(id, entry)| NotificationEntry::new(id, entry))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        let skip = matches.len().saturating_sub(limit);
        Ok(matches.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;
    use whmon_core::{evaluate, BreachCandidate};

    const THRESHOLDS: &str = "/warehouse/thresholds";
    const READINGS: &str = "/warehouse/data";
    const NOTIFICATIONS: &str = "/warehouse/notifications/general";

    fn candidate(ts: &str) -> BreachCandidate {
        let set = ThresholdSet::new(30.0, 10.0, 80.0, 20.0);
        evaluate(&Reading::new(ts, 35.0, 50.0), &set).remove(0)
    }

    #[tokio::test]
    async fn threshold_subscription_delivers_current_then_changes() {
        let store = MemoryStore::new();
        store.put_thresholds(THRESHOLDS, &ThresholdSet::new(30.0, 10.0, 80.0, 20.0));

        let mut sub = store.subscribe_thresholds(THRESHOLDS).await.unwrap();
        assert_eq!(sub.next().await.unwrap().temp_high, 30.0);

        store.put_thresholds(THRESHOLDS, &ThresholdSet::new(25.0, 10.0, 80.0, 20.0));
        assert_eq!(sub.next().await.unwrap().temp_high, 25.0);
    }

    #[tokio::test]
    async fn malformed_thresholds_are_not_delivered() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_thresholds(THRESHOLDS).await.unwrap();

        store.set(THRESHOLDS, json!({"tempHigh": "hot"}));
        store.put_thresholds(THRESHOLDS, &ThresholdSet::new(31.0, 10.0, 80.0, 20.0));

        assert_eq!(sub.next().await.unwrap().temp_high, 31.0);
    }

    #[tokio::test]
    async fn reading_subscription_sees_full_log() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_readings(READINGS).await.unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        store.insert_reading(READINGS, "2024-01-01_00:00:00", &Reading::new("2024-01-01T00:00:00", 20.0, 50.0));
        store.insert_reading(READINGS, "2024-01-01_00:01:00", &Reading::new("2024-01-01T00:01:00", 21.0, 50.0));

        assert_eq!(sub.next().await.unwrap().len(), 1);
        let log = sub.next().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest_key(), Some("2024-01-01_00:01:00"));
    }

    #[tokio::test]
    async fn republish_redelivers_same_snapshot() {
        let store = MemoryStore::new();
        store.insert_reading(READINGS, "k", &Reading::new("2024-01-01T00:00:00", 20.0, 50.0));
        let mut sub = store.subscribe_readings(READINGS).await.unwrap();

        let first = sub.next().await.unwrap();
        store.republish(READINGS);
        assert_eq!(sub.next().await.unwrap(), first);
    }

    #[tokio::test]
    async fn subscriptions_ignore_other_paths() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_thresholds(THRESHOLDS).await.unwrap();
        store.set("/elsewhere", json!({"tempHigh": 1, "tempLow": 0, "humHigh": 1, "humLow": 0}));
        store.put_thresholds(THRESHOLDS, &ThresholdSet::new(40.0, 10.0, 80.0, 20.0));
        assert_eq!(sub.next().await.unwrap().temp_high, 40.0);
    }

    #[tokio::test]
    async fn append_and_query_by_field() {
        let store = MemoryStore::new();
        let first = NewNotification::from_candidate(&candidate("2024-01-01T00:00:00"), Utc::now());
        let second = NewNotification::from_candidate(&candidate("2024-01-01T00:05:00"), Utc::now());

        let k1 = store.append(NOTIFICATIONS, &first).await.unwrap();
        let k2 = store.append(NOTIFICATIONS, &second).await.unwrap();
        assert!(k1 < k2, "generated keys must be insertion ordered");

        let found = store
            .query_by_field(NOTIFICATIONS, "dataTimestamp", &json!("2024-01-01T00:05:00"), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, k2);
        assert_eq!(found[0].decode().unwrap().body, second);
    }

    #[tokio::test]
    async fn query_keeps_last_matches() {
        let store = MemoryStore::new();
        let n = NewNotification::from_candidate(&candidate("2024-01-01T00:00:00"), Utc::now());
        let keys: Vec<String> = [
            store.append(NOTIFICATIONS, &n).await.unwrap(),
            store.append(NOTIFICATIONS, &n).await.unwrap(),
            store.append(NOTIFICATIONS, &n).await.unwrap(),
        ]
        .into();

        let found = store
            .query_by_field(NOTIFICATIONS, "type", &json!("threshold_breach"), 2)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![keys[1].as_str(), keys[2].as_str()]);
    }

    #[tokio::test]
    async fn query_returns_records_of_any_shape() {
        let store = MemoryStore::new();
        let key = store.push(
            NOTIFICATIONS,
            json!({
                "type": "threshold_breach",
                "parameter": "temperature",
                "breachType": "high",
                "dataTimestamp": "2024-01-01T00:00:00",
                "note": "no createdAt"
            }),
        );

        let found = store
            .query_by_field(NOTIFICATIONS, "dataTimestamp", &json!("2024-01-01T00:00:00"), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, key);
        assert!(found[0].decode().is_err());
        assert_eq!(
            found[0].dedup_key(),
            Some(whmon_core::DedupKey::from(&candidate("2024-01-01T00:00:00")))
        );
    }

    #[tokio::test]
    async fn unavailable_store_fails_operations() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert_matches!(
            store.subscribe_readings(READINGS).await,
            Err(StoreError::Unavailable(_))
        );
        let n = NewNotification::from_candidate(&candidate("t"), Utc::now());
        assert_matches!(store.append(NOTIFICATIONS, &n).await, Err(StoreError::Unavailable(_)));

        store.set_unavailable(false);
        assert!(store.append(NOTIFICATIONS, &n).await.is_ok());
    }

    #[tokio::test]
    async fn read_returns_absent_for_unwritten_paths() {
        let store = MemoryStore::new();
        assert!(store.read_thresholds(THRESHOLDS).await.unwrap().is_none());
        assert!(store.read_readings(READINGS).await.unwrap().is_none());
    }
}
