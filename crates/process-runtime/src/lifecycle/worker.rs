//! # Worker
//!
//! The start/stop surface the host process drives.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bootstrap::{BootstrapPlan, BootstrapSequencer, RunningHandle, StepStatus};
use crate::errors::{LifecycleError, ShutdownError};
use crate::lifecycle::state::{WorkerState, WorkerStateCell};
use crate::pump::PumpSnapshot;
use crate::subscriptions::SubscriptionSet;

/// A worker process's lifecycle.
///
/// `start` runs the bootstrap; `stop` releases whatever is held, whether the
/// worker is running, never started, failed to start, or is still starting.
pub struct Worker {
    sequencer: BootstrapSequencer,
    state: Arc<WorkerStateCell>,
    /// Held by `start` for the whole bootstrap.
    running: tokio::sync::Mutex<Option<RunningHandle>>,
    /// Present while a bootstrap is in flight, or after its `start` future
    /// was dropped and until `stop` reclaims what it left.
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl Worker {
    /// Create a stopped worker for `plan`.
    pub fn new(plan: BootstrapPlan) -> Self {
        let state = Arc::new(WorkerStateCell::new());
        Self {
            sequencer: BootstrapSequencer::new(plan, Arc::clone(&state)),
            state,
            running: tokio::sync::Mutex::new(None),
            cancel: Mutex::new(None),
        }
    }

    /// Bootstrap and begin consuming.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the worker is not `Stopped`; nothing changes.
    /// - `Bootstrap` if any phase failed; the worker is `Stopped` again with
    ///   nothing held, and `start` may be retried.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut running = self.running.lock().await;
        let cancel_rx = {
            let mut cancel = self.cancel.lock();
            if let Err(state) = self.state.try_begin_start() {
                warn!(?state, "start() refused");
                return Err(LifecycleError::InvalidState {
                    operation: "start",
                    state,
                });
            }
            let (tx, rx) = watch::channel(false);
            *cancel = Some(tx);
            rx
        };

        let result = self.sequencer.start(cancel_rx).await;
        self.cancel.lock().take();

        let handle = result?;
        *running = Some(handle);
        Ok(())
    }

    /// Stop consuming and release everything.
    ///
    /// A stop during bootstrap cancels it. If the `start` future was dropped
    /// mid-bootstrap, whatever it acquired is released here and the worker
    /// can be started again. Calling `stop` again, or on a worker that never
    /// started, is a no-op.
    ///
    /// # Errors
    ///
    /// `Shutdown` if teardown hooks failed; resources were still released.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        if let Some(cancel) = self.cancel.lock().as_ref() {
            info!("Stop requested during bootstrap, cancelling");
            cancel.send_replace(true);
        }

        let mut running = self.running.lock().await;

        // A live `start` holds `running` until it clears `cancel`, so a
        // sender still present here belongs to a dropped bootstrap.
        if self.cancel.lock().take().is_some() {
            return self.reclaim_abandoned().await;
        }

        let Some(handle) = running.take() else {
            debug!(state = ?self.state.current(), "Nothing to stop");
            return Ok(());
        };

        handle.stop().await?;
        Ok(())
    }

    async fn reclaim_abandoned(&self) -> Result<(), LifecycleError> {
        warn!("Bootstrap was abandoned mid-flight, releasing what it acquired");
        self.state.set(WorkerState::Stopping);
        let failures = self.sequencer.reclaim().await;
        self.state.set(WorkerState::Stopped);
        info!(failed_teardowns = failures.len(), "Abandoned bootstrap released");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { failures }.into())
        }
    }

    /// Same as [`Worker::stop`]; the host's disposal hook.
    pub async fn dispose(&self) -> Result<(), LifecycleError> {
        self.stop().await
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state.current()
    }

    /// Recent state transitions, oldest first.
    #[must_use]
    pub fn state_history(&self) -> Vec<WorkerState> {
        self.state.history()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// `(name, status)` of every init step.
    #[must_use]
    pub fn step_statuses(&self) -> Vec<(String, StepStatus)> {
        self.sequencer.plan().graph.statuses()
    }

    /// Registered subscriptions while running.
    pub async fn subscriptions(&self) -> Option<SubscriptionSet> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.subscriptions().clone())
    }

    /// Message pump counters while running.
    pub async fn pump_stats(&self) -> Option<PumpSnapshot> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(RunningHandle::pump_stats)
    }
}
