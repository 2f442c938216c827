//! Background listener behind a realtime-database [`Subscription`].
//!
//! The first stream is opened before [`spawn`] returns, so a store that
//! cannot be reached at startup is reported to the caller. After that the
//! listener task owns the connection: it mirrors the location in a local
//! JSON tree, decodes the whole tree after every change, and reconnects
//! with backoff whenever the stream drops.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::client::RestClient;
use super::reconnect::{reconnect_loop, ReconnectConfig};
use super::sse::{SseDecoder, SseEvent, StreamEvent};
use super::tree;
use crate::error::StoreError;
use crate::subscription::{Subscription, SUBSCRIPTION_BUFFER};

/// Decodes a full snapshot into a subscription item; `None` skips it.
pub(crate) type Decoder<T> = fn(&str, &serde_json::Value) -> Option<T>;

/// Why a single stream connection ended.
#[derive(Debug)]
enum StreamEnd {
    /// Cancelled or the consumer went away; do not reconnect.
    Stopped,
    /// The connection dropped or the server ended it; reconnect.
    Disconnected(String),
}

/// Open a stream on `path` and spawn the listener task.
pub(crate) async fn spawn<T>(
    client: Arc<RestClient>,
    path: &str,
    decode: Decoder<T>,
    reconnect: ReconnectConfig,
) -> Result<Subscription<T>, StoreError>
where
    T: Send + 'static,
{
    let response = client.open_stream(path).await?;
    tracing::info!(path, "Event stream established");

    let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(
        client,
        path.to_string(),
        response,
        decode,
        tx,
        cancel.clone(),
        reconnect,
    ));

    Ok(Subscription::new(path, rx, cancel, task))
}

async fn run<T>(
    client: Arc<RestClient>,
    path: String,
    mut response: reqwest::Response,
    decode: Decoder<T>,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
    reconnect: ReconnectConfig,
) where
    T: Send + 'static,
{
    loop {
        match consume(response, &path, decode, &tx, &cancel).await {
            StreamEnd::Stopped => break,
            StreamEnd::Disconnected(reason) => {
                tracing::warn!(path = %path, reason = %reason, "Event stream disconnected");
            }
        }

        response = match reconnect_loop(&client, &path, &reconnect, &cancel).await {
            Some(response) => response,
            None => break,
        };
    }

    tracing::info!(path = %path, "Event stream listener stopped");
}

/// Read one connection until it ends.
///
/// Every connection starts from an empty tree: the server opens each
/// stream with a `put` of the full value at the root.
async fn consume<T>(
    response: reqwest::Response,
    path: &str,
    decode: Decoder<T>,
    tx: &mpsc::Sender<T>,
    cancel: &CancellationToken,
) -> StreamEnd {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut root = serde_json::Value::Null;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return StreamEnd::Stopped,
            chunk = body.next() => chunk,
        };

        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return StreamEnd::Disconnected(e.to_string()),
            None => return StreamEnd::Disconnected("stream ended".into()),
        };

        for raw in decoder.push(&bytes) {
            match apply_event(&mut root, &raw, path) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(end) => return end,
            }
            if let Some(item) = decode(path, &root) {
                if tx.send(item).await.is_err() {
                    return StreamEnd::Stopped;
                }
            }
        }
    }
}

/// Apply one event to the mirrored tree and report whether it changed.
fn apply_event(
    root: &mut serde_json::Value,
    raw: &SseEvent,
    path: &str,
) -> Result<bool, StreamEnd> {
    match StreamEvent::parse(raw) {
        Ok(StreamEvent::Put { path: at, data }) => {
            tree::apply_put(root, &at, data);
            Ok(true)
        }
        Ok(StreamEvent::Patch { path: at, data }) => {
            tree::apply_patch(root, &at, data);
            Ok(true)
        }
        Ok(StreamEvent::KeepAlive) => Ok(false),
        Ok(StreamEvent::Cancel(reason)) => Err(StreamEnd::Disconnected(format!(
            "cancelled by server: {reason}"
        ))),
        Ok(StreamEvent::AuthRevoked) => Err(StreamEnd::Disconnected("auth revoked".into())),
        Ok(StreamEvent::Unknown(name)) => {
            tracing::debug!(path, event = %name, "Ignoring unknown stream event");
            Ok(false)
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Skipping undecodable stream event");
            Ok(false)
        }
    }
}
