//! Exponential-backoff reconnection for event-stream listeners.
//!
//! When a stream to the realtime database drops, the listener calls
//! [`reconnect_loop`] to keep retrying with increasing delays until either
//! the stream is re-opened or the [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::client::RestClient;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Re-open the event stream at `path` with exponential backoff.
///
/// Waits before every attempt, so a server that accepts and immediately
/// closes the stream is not hammered. Returns `None` if `cancel` fires first.
pub async fn reconnect_loop(
    client: &RestClient,
    path: &str,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<reqwest::Response> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            path,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting event stream",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(path, "Reconnect cancelled");
                return None;
            }
            result = client.open_stream(path) => {
                match result {
                    Ok(response) => {
                        tracing::info!(path, attempt, "Event stream reconnected");
                        return Some(response);
                    }
                    Err(e) => {
                        tracing::warn!(path, error = %e, "Reconnect attempt {attempt} failed");
                    }
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
