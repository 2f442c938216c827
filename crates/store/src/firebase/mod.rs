//! Firebase Realtime Database backend.
//!
//! [`FirebaseStore`] implements every collaborator trait over the database's
//! REST protocol: one-shot requests through [`client::RestClient`] and
//! subscriptions through server-sent-event streams managed by a background
//! listener (see [`listener`]).

pub mod client;
mod listener;
pub mod reconnect;
pub mod sse;
pub mod tree;

use std::sync::Arc;

use async_trait::async_trait;
use whmon_core::{NewNotification, NotificationEntry, ReadingLog, ThresholdSet};

use crate::decode;
use crate::error::StoreError;
use crate::subscription::Subscription;
use crate::traits::{NotificationSink, ReadingStore, ThresholdStore};

use client::RestClient;
use reconnect::ReconnectConfig;

/// Connection settings for the realtime database.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Database base URL, e.g. `https://<db>.firebaseio.com`.
    pub database_url: String,
    /// Database secret or ID token, sent as the `auth` query parameter.
    pub auth_token: Option<String>,
}

/// Realtime-database-backed store. See the module docs.
pub struct FirebaseStore {
    client: Arc<RestClient>,
    reconnect: ReconnectConfig,
}

impl FirebaseStore {
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        let client = RestClient::new(&config.database_url, config.auth_token.clone())?;
        Ok(Self {
            client: Arc::new(client),
            reconnect: ReconnectConfig::default(),
        })
    }

    /// Override the reconnect backoff used by subscriptions.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Absolute REST URL of `path`.
    pub fn url(&self, path: &str) -> String {
        self.client.url(path)
    }
}

#[async_trait]
impl ThresholdStore for FirebaseStore {
    async fn read_thresholds(&self, path: &str) -> Result<Option<ThresholdSet>, StoreError> {
        let value = self.client.get(path).await?;
        Ok(decode::thresholds(path, &value))
    }

    async fn subscribe_thresholds(
        &self,
        path: &str,
    ) -> Result<Subscription<ThresholdSet>, StoreError> {
        listener::spawn(
            Arc::clone(&self.client),
            path,
            decode::thresholds,
            self.reconnect.clone(),
        )
        .await
    }
}

#[async_trait]
impl ReadingStore for FirebaseStore {
    async fn read_readings(&self, path: &str) -> Result<Option<ReadingLog>, StoreError> {
        match self.client.get(path).await? {
            serde_json::Value::Null => Ok(None),
            value => Ok(decode::readings(path, &value)),
        }
    }

    async fn subscribe_readings(&self, path: &str) -> Result<Subscription<ReadingLog>, StoreError> {
        listener::spawn(
            Arc::clone(&self.client),
            path,
            decode::readings,
            self.reconnect.clone(),
        )
        .await
    }
}

#[async_trait]
impl NotificationSink for FirebaseStore {
    async fn append(
        &self,
        path: &str,
        notification: &NewNotification,
    ) -> Result<String, StoreError> {
        let key = self.client.push(path, notification).await?;
        tracing::debug!(path, key = %key, "Notification appended");
        Ok(key)
    }

    async fn query_by_field(
        &self,
        path: &str,
        field: &str,
        value: &serde_json::Value,
        limit: usize,
    ) -> Result<Vec<NotificationEntry>, StoreError> {
        let found = self.client.query(path, field, value, limit).await?;
        // The REST API returns matches as an unordered object; generated
        // keys sort chronologically.
        let mut entries: Vec<NotificationEntry> = found
            .into_iter()
            .map(|(id, entry)| NotificationEntry::new(id, entry))
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }
}
