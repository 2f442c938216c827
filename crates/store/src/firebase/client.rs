//! REST client for the realtime database.
//!
//! Every location is addressable as `{base}{path}.json`. Reads are `GET`,
//! appends are `POST` (the server answers with the generated key), queries
//! use the `orderBy`/`equalTo`/`limitToLast` parameters, and subscriptions
//! are a `GET` with `Accept: text/event-stream`.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Timeout for a single read, append or query.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for establishing a TCP/TLS connection (streams included).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response to an append.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// HTTP client bound to one database.
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl RestClient {
    /// Create a client for `base_url`, e.g. `https://<db>.firebaseio.com`.
    ///
    /// `auth` is sent as the `auth` query parameter (database secret or ID
    /// token). No total timeout is set on the client itself because event
    /// streams stay open indefinitely; one-shot requests set their own.
    pub fn new(base_url: &str, auth: Option<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Absolute URL of the JSON document at `path`.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{path}.json", self.base_url)
        } else {
            format!("{}/{path}.json", self.base_url)
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.auth {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    /// Check the response status, capturing the body of failures.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// Read the value at `path`; `null` when nothing is stored there.
    pub async fn get(&self, path: &str) -> Result<serde_json::Value, StoreError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Append `body` as a new child of `path` and return its key.
    pub async fn push<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String, StoreError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;
        let text = Self::check(response).await?.text().await?;
        let pushed: PushResponse = serde_json::from_str(&text)?;
        Ok(pushed.name)
    }

    /// Children of `path` whose `field` equals `value`, last `limit` by that
    /// ordering. The server needs an `.indexOn` rule for `field`.
    pub async fn query(
        &self,
        path: &str,
        field: &str,
        value: &serde_json::Value,
        limit: usize,
    ) -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
        let order_by = serde_json::Value::String(field.to_string()).to_string();
        let equal_to = value.to_string();
        let limit = limit.to_string();

        let response = self
            .request(reqwest::Method::GET, path)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("orderBy", order_by.as_str()),
                ("equalTo", equal_to.as_str()),
                ("limitToLast", limit.as_str()),
            ])
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;

        match serde_json::from_str(&body)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }

    /// Open an event stream on `path`.
    ///
    /// Resolves once the server has accepted the stream; events are read
    /// from the returned response body.
    pub async fn open_stream(&self, path: &str) -> Result<reqwest::Response, StoreError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        Self::check(response).await
    }
}
