//! Server-sent-event framing for the realtime database stream protocol.
//!
//! The stream is a sequence of blocks separated by a blank line:
//!
//! ```text
//! event: put
//! data: {"path": "/", "data": {...}}
//!
//! ```
//!
//! [`SseDecoder`] turns arbitrary byte chunks into [`SseEvent`]s, and
//! [`StreamEvent::parse`] interprets them.

use serde::Deserialize;

use crate::error::StoreError;

/// One raw event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental decoder. Chunks may split lines or UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_empty() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Payload of `put` and `patch` events.
#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Interpreted stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Replace the value at `path` (relative to the subscribed location).
    Put { path: String, data: serde_json::Value },
    /// Merge the children of `data` into the value at `path`.
    Patch { path: String, data: serde_json::Value },
    KeepAlive,
    /// The server stopped the stream, e.g. because security rules changed.
    Cancel(String),
    /// The auth token expired or was revoked.
    AuthRevoked,
    Unknown(String),
}

impl StreamEvent {
    pub fn parse(raw: &SseEvent) -> Result<Self, StoreError> {
        match raw.event.as_str() {
            "put" => {
                let payload: ChangePayload = serde_json::from_str(&raw.data)?;
                Ok(StreamEvent::Put {
                    path: payload.path,
                    data: payload.data,
                })
            }
            "patch" => {
                let payload: ChangePayload = serde_json::from_str(&raw.data)?;
                Ok(StreamEvent::Patch {
                    path: payload.path,
                    data: payload.data,
                })
            }
            "keep-alive" => Ok(StreamEvent::KeepAlive),
            "cancel" => Ok(StreamEvent::Cancel(raw.data.clone())),
            "auth_revoked" => Ok(StreamEvent::AuthRevoked),
            other => Ok(StreamEvent::Unknown(other.to_string())),
        }
    }
}
