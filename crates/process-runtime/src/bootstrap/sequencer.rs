//! # Bootstrap Sequencer
//!
//! Brings a worker online in three phases and refuses to skip ahead:
//!
//! ```text
//! ┌───────────────┐   all Ready   ┌───────────────┐   accepted   ┌───────────────┐
//! │  Init steps   │ ────────────→ │ Subscriptions │ ───────────→ │   Transport   │
//! │ (graph order) │               │  (in order)   │              │  + pump task  │
//! └───────┬───────┘               └───────┬───────┘              └───────┬───────┘
//!         │ fail / timeout / cancel       │ fail / cancel                │ refuse
//!         └───────────────────────────────┴──────────────────────────────┘
//!                                         ▼
//!                     Faulted → unwind Ready steps newest first → Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use shared_bus::{EventTypeId, SubscriptionManager, Transport};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::bootstrap::graph::DependencyGraph;
use crate::bootstrap::resources::{AcquiredResources, RunningHandle};
use crate::bootstrap::step::{InitStep, StepStatus};
use crate::bootstrap::{wait_for_cancel, SUBSCRIPTIONS_STAGE, TRANSPORT_STAGE};
use crate::errors::{BootstrapError, BoxError, TeardownFailure};
use crate::filter::MessageTargetFilter;
use crate::lifecycle::{WorkerState, WorkerStateCell};
use crate::pump::{DrainPolicy, EnvelopeDispatcher, MessagePump};
use crate::subscriptions::register_subscriptions;

/// Tunables for one bootstrap.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Upper bound on a single step's `run`. `None` waits indefinitely.
    pub step_timeout: Option<Duration>,
    /// What the pump does with buffered envelopes at shutdown.
    pub drain_policy: DrainPolicy,
}

/// Everything a worker needs to come online.
pub struct BootstrapPlan {
    /// Init steps in dependency order.
    pub graph: Arc<DependencyGraph>,
    /// Where subscriptions are registered.
    pub subscription_manager: Arc<dyn SubscriptionManager>,
    /// Event types to subscribe to, in order.
    pub event_types: Vec<EventTypeId>,
    /// The bus to consume from.
    pub transport: Arc<dyn Transport>,
    /// The process engine entry point.
    pub dispatcher: Arc<dyn EnvelopeDispatcher>,
    /// Decides which envelopes belong to this worker.
    pub filter: MessageTargetFilter,
    /// Tunables.
    pub options: BootstrapOptions,
}

enum StepOutcome {
    Ready,
    Failed(BoxError),
    Cancelled,
}

/// Drives a [`BootstrapPlan`] and owns the unwind on failure.
///
/// Resources acquired by a bootstrap in flight live in `in_flight`, not on
/// the `start` future's stack, so a dropped `start` leaves them behind for
/// the worker's `stop` to reclaim.
pub struct BootstrapSequencer {
    plan: BootstrapPlan,
    state: Arc<WorkerStateCell>,
    in_flight: Mutex<Option<AcquiredResources>>,
}

impl BootstrapSequencer {
    /// Create a sequencer that reports progress through `state`.
    pub fn new(plan: BootstrapPlan, state: Arc<WorkerStateCell>) -> Self {
        Self {
            plan,
            state,
            in_flight: Mutex::new(None),
        }
    }

    /// The plan being executed.
    #[must_use]
    pub fn plan(&self) -> &BootstrapPlan {
        &self.plan
    }

    /// Run the bootstrap.
    ///
    /// Setting `cancel` to `true` at any point before the transport opens is
    /// handled exactly like a failed step.
    ///
    /// # Errors
    ///
    /// Returns the first failure. By then every Ready step has been torn
    /// down, the transport was never opened, and the state is `Stopped`.
    pub async fn start(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunningHandle, BootstrapError> {
        let graph = Arc::clone(&self.plan.graph);
        graph.reset();

        // Held for the whole bootstrap. If this future is dropped the guard
        // goes with it and whatever was acquired stays in the slot.
        let mut slot = self.in_flight.lock().await;
        *slot = Some(AcquiredResources::new(Arc::clone(&graph)));

        info!(steps = graph.len(), "Bootstrapping worker");

        for index in 0..graph.len() {
            let step = Arc::clone(graph.step(index));
            let name = step.name().to_string();

            graph.begin(index);
            info!(step = %name, position = index + 1, "Starting init step");

            match self.run_step(step.as_ref(), &mut cancel).await {
                StepOutcome::Ready => {
                    if let Some(resources) = slot.as_mut() {
                        resources.step_ready(index);
                    }
                    graph.set_status(index, StepStatus::Ready);
                    info!(step = %name, "Init step ready");
                }
                StepOutcome::Failed(source) => {
                    graph.set_status(index, StepStatus::Failed);
                    let failure = BootstrapError::Step { step: name, source };
                    return Err(self.abort(&mut slot, failure).await);
                }
                StepOutcome::Cancelled => {
                    graph.set_status(index, StepStatus::Failed);
                    let failure = BootstrapError::Cancelled { stage: name };
                    return Err(self.abort(&mut slot, failure).await);
                }
            }
        }

        let registered = tokio::select! {
            biased;
            () = wait_for_cancel(&mut cancel) => Err(BootstrapError::Cancelled {
                stage: SUBSCRIPTIONS_STAGE.to_string(),
            }),
            result = register_subscriptions(
                self.plan.subscription_manager.as_ref(),
                &self.plan.event_types,
            ) => result.map_err(BootstrapError::from),
        };
        let subscriptions = match registered {
            Ok(subscriptions) => subscriptions,
            Err(failure) => return Err(self.abort(&mut slot, failure).await),
        };

        if *cancel.borrow() {
            let failure = BootstrapError::Cancelled {
                stage: TRANSPORT_STAGE.to_string(),
            };
            return Err(self.abort(&mut slot, failure).await);
        }

        let inbox = match self.plan.transport.start_consuming() {
            Ok(inbox) => inbox,
            Err(e) => return Err(self.abort(&mut slot, BootstrapError::Transport(e)).await),
        };

        // No await from here on: the resources leave the slot and the pump
        // is running before this future can be dropped again.
        let mut resources = slot
            .take()
            .unwrap_or_else(|| AcquiredResources::new(Arc::clone(&graph)));
        drop(slot);
        resources.transport_opened(Arc::clone(&self.plan.transport));

        let pump = MessagePump::new(
            self.plan.filter.clone(),
            Arc::clone(&self.plan.dispatcher),
            self.plan.options.drain_policy,
        );
        let stats = pump.stats();
        self.state.set(WorkerState::Running);
        resources.pump_started(pump.spawn(inbox));

        info!(
            steps = graph.len(),
            subscriptions = subscriptions.len(),
            target_system = %self.plan.filter.target(),
            "Worker running"
        );

        Ok(RunningHandle::new(
            resources,
            Arc::clone(&self.state),
            subscriptions,
            stats,
        ))
    }

    async fn run_step(
        &self,
        step: &dyn InitStep,
        cancel: &mut watch::Receiver<bool>,
    ) -> StepOutcome {
        let limit = self.plan.options.step_timeout;
        let run = async {
            match limit {
                Some(limit) => match tokio::time::timeout(limit, step.run()).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("did not complete within {limit:?}")),
                },
                None => step.run().await,
            }
        };

        tokio::select! {
            biased;
            () = wait_for_cancel(cancel) => StepOutcome::Cancelled,
            result = run => match result {
                Ok(()) => StepOutcome::Ready,
                Err(e) => StepOutcome::Failed(e.into()),
            },
        }
    }

    /// Release whatever an abandoned bootstrap left behind.
    ///
    /// The `start` future that acquired the resources must already be gone.
    /// Steps cut off mid-run return to Pending without a teardown.
    pub(crate) async fn reclaim(&self) -> Vec<TeardownFailure> {
        let mut slot = self.in_flight.lock().await;
        let failures = release_slot(&mut slot).await;
        self.plan.graph.reset();
        failures
    }

    async fn abort(
        &self,
        slot: &mut Option<AcquiredResources>,
        failure: BootstrapError,
    ) -> BootstrapError {
        error!(stage = failure.failed_stage(), error = %failure, "Bootstrap failed, unwinding");
        self.state.set(WorkerState::Faulted);

        let failures = release_slot(slot).await;
        if !failures.is_empty() {
            warn!(
                failed_teardowns = failures.len(),
                "Unwind finished with teardown errors"
            );
        }

        self.state.set(WorkerState::Stopped);
        failure
    }
}

/// Release in place, so a release cut short by a drop leaves the rest in
/// the slot.
async fn release_slot(slot: &mut Option<AcquiredResources>) -> Vec<TeardownFailure> {
    let failures = match slot.as_mut() {
        Some(resources) => resources.release().await,
        None => Vec::new(),
    };
    *slot = None;
    failures
}
