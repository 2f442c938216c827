//! Breach monitor orchestrator.
//!
//! [`Monitor`] owns the threshold cache and the event loop. It subscribes to
//! the threshold location and the reading collection, replaces its cached
//! [`ThresholdSnapshot`] on every threshold change, and spawns one
//! evaluation task per reading change while armed. Each task holds the
//! snapshot that was current when the change arrived, so a threshold update
//! never alters an evaluation already in progress.
//!
//! Startup failures (a subscription that cannot be established) are fatal
//! and returned from [`Monitor::start`]. Failures inside an evaluation cycle
//! are logged and the monitor keeps listening.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use whmon_core::{ReadingLog, ThresholdSet, Timestamp};
use whmon_store::{NotificationSink, ReadingStore, Subscription, ThresholdStore};

use crate::config::{DedupStrategy, MonitorConfig};
use crate::emitter::NotificationEmitter;
use crate::error::MonitorError;
use crate::evaluation::Evaluator;
use crate::guard::{DedupGuard, MemoryGuard, SinkGuard};
use crate::state::{MonitorPhase, MonitorState, ThresholdSnapshot};

type Evaluation = Result<Vec<String>, MonitorError>;

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct Monitor {
    config: MonitorConfig,
    thresholds: Arc<dyn ThresholdStore>,
    readings: Arc<dyn ReadingStore>,
    evaluator: Arc<Evaluator>,
    state: MonitorState,
    version: u64,
    phase: watch::Sender<MonitorPhase>,
}

impl Monitor {
    /// Build a monitor over the given collaborators.
    ///
    /// The dedup guard is chosen by [`MonitorConfig::dedup_strategy`].
    pub fn new(
        config: MonitorConfig,
        thresholds: Arc<dyn ThresholdStore>,
        readings: Arc<dyn ReadingStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let guard: Arc<dyn DedupGuard> = match config.dedup_strategy {
            DedupStrategy::Durable => Arc::new(SinkGuard::new(
                Arc::clone(&sink),
                config.notifications_path.clone(),
                config.dedup_query_limit,
            )),
            DedupStrategy::Memory => Arc::new(MemoryGuard::new()),
        };
        let emitter = NotificationEmitter::new(sink, guard, config.notifications_path.clone());
        let evaluator = Arc::new(Evaluator::new(emitter, config.staleness_filter));
        let (phase, _) = watch::channel(MonitorPhase::Idle);

        Self {
            config,
            thresholds,
            readings,
            evaluator,
            state: MonitorState::Idle,
            version: 0,
            phase,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Receiver for phase changes.
    pub fn phase(&self) -> watch::Receiver<MonitorPhase> {
        self.phase.subscribe()
    }

    /// Replace the cached thresholds.
    ///
    /// `received_at` is the logical update time unless the set carries its
    /// own `updatedAt`. Sets that fail validation are still applied, with a
    /// warning: the operator's latest write is the one in force.
    ///
    /// A delivery equal to the cached set (a reconnect resending the whole
    /// tree, or a patch that touched no limit) keeps the existing snapshot
    /// and its update time.
    pub fn on_thresholds(&mut self, thresholds: ThresholdSet, received_at: Timestamp) {
        if let MonitorState::Armed(current) = &self.state {
            if current.thresholds == thresholds {
                tracing::debug!(
                    version = current.version,
                    updated_at = %current.updated_at,
                    "Thresholds unchanged",
                );
                return;
            }
        }

        if let Err(e) = thresholds.validate() {
            tracing::warn!(error = %e, "Threshold set failed validation");
        }

        self.version += 1;
        let snapshot = ThresholdSnapshot::observe(thresholds, received_at, self.version);
        tracing::info!(
            version = snapshot.version,
            updated_at = %snapshot.updated_at,
            temp_high = snapshot.thresholds.temp_high,
            temp_low = snapshot.thresholds.temp_low,
            hum_high = snapshot.thresholds.hum_high,
            hum_low = snapshot.thresholds.hum_low,
            "Thresholds updated",
        );

        self.state = MonitorState::Armed(Arc::new(snapshot));
        self.phase.send_if_modified(|phase| {
            if *phase == MonitorPhase::Idle {
                *phase = MonitorPhase::Armed;
                true
            } else {
                false
            }
        });
    }

    /// Evaluate a reading change inline against the current thresholds.
    ///
    /// Ignored while idle. Returns the keys of the notifications written.
    pub async fn on_readings(&self, log: ReadingLog) -> Result<Vec<String>, MonitorError> {
        match self.state.snapshot() {
            Some(snapshot) => self.evaluator.process(snapshot, log).await,
            None => {
                tracing::debug!("Ignoring reading change: no thresholds observed yet");
                Ok(Vec::new())
            }
        }
    }

    /// Subscribe to both stores and run the event loop in the background.
    ///
    /// Fails without spawning anything if either subscription cannot be
    /// established.
    pub async fn start(self, cancel: CancellationToken) -> Result<MonitorHandle, MonitorError> {
        let (thresholds, readings) = self.subscribe().await?;
        let phase = self.phase();
        let task = tokio::spawn(self.listen(thresholds, readings, cancel.clone()));
        Ok(MonitorHandle {
            task,
            cancel,
            phase,
        })
    }

    /// Subscribe and run the event loop until `cancel` fires or a
    /// subscription ends.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), MonitorError> {
        let (thresholds, readings) = self.subscribe().await?;
        self.listen(thresholds, readings, cancel).await;
        Ok(())
    }

    async fn subscribe(
        &self,
    ) -> Result<(Subscription<ThresholdSet>, Subscription<ReadingLog>), MonitorError> {
        let thresholds = self
            .thresholds
            .subscribe_thresholds(&self.config.thresholds_path)
            .await
            .map_err(|source| MonitorError::Startup {
                store: "threshold store",
                path: self.config.thresholds_path.clone(),
                source,
            })?;

        let readings = match self.readings.subscribe_readings(&self.config.readings_path).await {
            Ok(readings) => readings,
            Err(source) => {
                thresholds.unsubscribe().await;
                return Err(MonitorError::Startup {
                    store: "reading store",
                    path: self.config.readings_path.clone(),
                    source,
                });
            }
        };

        tracing::info!(
            thresholds_path = %self.config.thresholds_path,
            readings_path = %self.config.readings_path,
            notifications_path = %self.config.notifications_path,
            dedup = %self.config.dedup_strategy,
            staleness_filter = self.config.staleness_filter,
            "Monitor subscribed",
        );
        Ok((thresholds, readings))
    }

    async fn listen(
        mut self,
        mut thresholds: Subscription<ThresholdSet>,
        mut readings: Subscription<ReadingLog>,
        cancel: CancellationToken,
    ) {
        let mut tasks: JoinSet<Evaluation> = JoinSet::new();

        loop {
            tokio::select! {
                // Threshold changes first, so a reading arriving together
                // with an update is evaluated against the new limits.
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Monitor cancelled");
                    break;
                }
                update = thresholds.next() => match update {
                    Some(set) => self.on_thresholds(set, Utc::now()),
                    None => {
                        tracing::warn!("Threshold subscription ended");
                        break;
                    }
                },
                log = readings.next() => match log {
                    Some(log) => self.dispatch(&mut tasks, log),
                    None => {
                        tracing::warn!("Reading subscription ended");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_evaluation(joined);
                    if tasks.is_empty() {
                        self.set_phase(MonitorPhase::Armed);
                    }
                }
            }
        }

        thresholds.unsubscribe().await;
        readings.unsubscribe().await;

        while let Some(joined) = tasks.join_next().await {
            log_evaluation(joined);
        }
        self.set_phase(MonitorPhase::Stopped);
        tracing::info!("Monitor stopped");
    }

    fn dispatch(&self, tasks: &mut JoinSet<Evaluation>, log: ReadingLog) {
        let Some(snapshot) = self.state.snapshot() else {
            tracing::debug!("Ignoring reading change: no thresholds observed yet");
            return;
        };

        let evaluator = Arc::clone(&self.evaluator);
        tasks.spawn(async move { evaluator.process(snapshot, log).await });
        self.set_phase(MonitorPhase::Evaluating);
    }

    fn set_phase(&self, phase: MonitorPhase) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
    }
}

fn log_evaluation(joined: Result<Evaluation, JoinError>) {
    match joined {
        Ok(Ok(ids)) if !ids.is_empty() => {
            tracing::debug!(emitted = ids.len(), "Evaluation cycle finished");
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Evaluation cycle failed"),
        Err(e) => tracing::error!(error = %e, "Evaluation task panicked"),
    }
}

// ---------------------------------------------------------------------------
// MonitorHandle
// ---------------------------------------------------------------------------

/// Handle to a monitor running in the background.
#[derive(Debug)]
pub struct MonitorHandle {
    task: JoinHandle<()>,
    cancel: CancellationToken,
    phase: watch::Receiver<MonitorPhase>,
}

impl MonitorHandle {
    pub fn phase(&self) -> watch::Receiver<MonitorPhase> {
        self.phase.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the event loop and wait up to `timeout` for it to unsubscribe
    /// and drain in-flight evaluations.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Monitor task panicked"),
            Err(_) => tracing::warn!("Monitor did not stop within {timeout:?}"),
        }
    }
}
