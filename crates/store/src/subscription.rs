//! Channel-backed store subscriptions.
//!
//! A [`Subscription`] is the receiving end of a background listener task.
//! Each item is a full snapshot of the subscribed path after a change. The
//! sequence is lazy and not restartable: once it ends, subscribe again.
//!
//! Dropping a subscription cancels its listener. [`Subscription::unsubscribe`]
//! additionally waits for the listener task to finish, so no registration
//! outlives the call.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Buffer between a listener task and its consumer.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 64;

/// Live stream of snapshots from one store path.
pub struct Subscription<T> {
    path: String,
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        path: impl Into<String>,
        rx: mpsc::Receiver<T>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            path: path.into(),
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// Store path this subscription listens to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the listener has stopped (store closed or
    /// subscription cancelled).
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) or a drop has cancelled
    /// the listener.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the listener and wait for its task to exit.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(path = %self.path, error = %e, "Subscription listener ended abnormally");
            }
        }
        tracing::debug!(path = %self.path, "Unsubscribed");
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> futures::Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
