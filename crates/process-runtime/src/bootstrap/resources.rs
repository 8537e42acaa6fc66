//! # Acquired Resources
//!
//! Everything a bootstrap has brought up so far, and the single teardown
//! routine shared by the failure path and `stop()`.

use std::fmt;
use std::sync::Arc;

use shared_bus::Transport;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bootstrap::graph::DependencyGraph;
use crate::bootstrap::step::StepStatus;
use crate::errors::{ShutdownError, TeardownFailure};
use crate::lifecycle::{WorkerState, WorkerStateCell};
use crate::pump::{PumpHandle, PumpSnapshot, PumpStats};
use crate::subscriptions::SubscriptionSet;

/// Resources held by one bootstrap, released in reverse acquisition order.
pub(crate) struct AcquiredResources {
    graph: Arc<DependencyGraph>,
    /// Indices of Ready steps, in the order they became Ready.
    ready: Vec<usize>,
    transport: Option<Arc<dyn Transport>>,
    pump: Option<PumpHandle>,
}

impl AcquiredResources {
    pub(crate) fn new(graph: Arc<DependencyGraph>) -> Self {
        Self {
            graph,
            ready: Vec::new(),
            transport: None,
            pump: None,
        }
    }

    pub(crate) fn step_ready(&mut self, index: usize) {
        self.ready.push(index);
    }

    pub(crate) fn transport_opened(&mut self, transport: Arc<dyn Transport>) {
        self.transport = Some(transport);
    }

    pub(crate) fn pump_started(&mut self, pump: PumpHandle) {
        self.pump = Some(pump);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.transport.is_none() && self.pump.is_none()
    }

    /// Close the transport, stop the pump, then tear down Ready steps newest
    /// first. Each resource is taken out before it is released, so a second
    /// call finds nothing left to do.
    pub(crate) async fn release(&mut self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();

        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.stop_consuming() {
                warn!(error = %e, "Transport failed to stop consuming");
                failures.push(TeardownFailure {
                    resource: crate::bootstrap::TRANSPORT_STAGE.to_string(),
                    message: e.to_string(),
                });
            }
        }

        if let Some(pump) = self.pump.take() {
            pump.close().await;
        }

        while let Some(index) = self.ready.pop() {
            let step = Arc::clone(self.graph.step(index));
            let name = step.name().to_string();

            match step.teardown().await {
                Ok(()) => info!(step = %name, "Init step torn down"),
                Err(e) => {
                    warn!(step = %name, error = %e, "Init step teardown failed");
                    failures.push(TeardownFailure {
                        resource: name,
                        message: format!("{e:#}"),
                    });
                }
            }
            self.graph.set_status(index, StepStatus::Pending);
        }

        failures
    }
}

/// A worker that bootstrapped successfully and is consuming.
pub struct RunningHandle {
    resources: Mutex<Option<AcquiredResources>>,
    state: Arc<WorkerStateCell>,
    subscriptions: SubscriptionSet,
    stats: Arc<PumpStats>,
}

impl RunningHandle {
    pub(crate) fn new(
        resources: AcquiredResources,
        state: Arc<WorkerStateCell>,
        subscriptions: SubscriptionSet,
        stats: Arc<PumpStats>,
    ) -> Self {
        Self {
            resources: Mutex::new(Some(resources)),
            state,
            subscriptions,
            stats,
        }
    }

    /// Stop consuming and tear everything down.
    ///
    /// Safe to call any number of times and from several tasks at once; only
    /// the first call releases anything.
    pub async fn stop(&self) -> Result<(), ShutdownError> {
        let mut guard = self.resources.lock().await;
        let Some(mut resources) = guard.take() else {
            debug!("Worker already stopped");
            return Ok(());
        };

        info!("Stopping worker");
        self.state.set(WorkerState::Stopping);
        let failures = resources.release().await;
        self.state.set(WorkerState::Stopped);
        info!(failed_teardowns = failures.len(), "Worker stopped");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { failures })
        }
    }

    /// Whether `stop` has already released everything.
    pub async fn is_stopped(&self) -> bool {
        self.resources.lock().await.is_none()
    }

    /// Event types registered during bootstrap.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Message pump counters.
    #[must_use]
    pub fn pump_stats(&self) -> PumpSnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for RunningHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningHandle")
            .field("subscriptions", &self.subscriptions)
            .field("pump", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl Drop for RunningHandle {
    fn drop(&mut self) {
        if self.resources.get_mut().as_ref().is_some_and(|r| !r.is_empty()) {
            warn!("Running worker dropped without stop(); init steps were not torn down");
        }
    }
}
