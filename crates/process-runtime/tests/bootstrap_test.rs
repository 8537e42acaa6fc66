//! # Bootstrap Sequencer Tests
//!
//! Exercises `BootstrapSequencer` directly, below the `Worker` surface.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{
    default_events, entries, envelope, in_memory_manager, new_log, plan, three_steps, Behavior,
    RecordingStep,
};
use parking_lot::Mutex;
use process_runtime::bootstrap::{BootstrapPlan, BootstrapSequencer};
use process_runtime::lifecycle::WorkerStateCell;
use process_runtime::{
    BootstrapError, BootstrapOptions, DependencyGraph, EnvelopeDispatcher, GraphError,
    MessageTargetFilter, StepStatus, TargetDescriptor, WorkerState,
};
use shared_bus::{Envelope, InMemoryTransport, Inbox, Transport, TransportError};
use tokio::sync::watch;
use tokio::time::timeout;

fn sequencer(
    steps: Vec<Arc<dyn process_runtime::InitStep>>,
) -> (BootstrapSequencer, Arc<WorkerStateCell>, common::Harness) {
    let (plan, harness) = plan(steps, in_memory_manager(), BootstrapOptions::default());
    let state = Arc::new(WorkerStateCell::new());
    (
        BootstrapSequencer::new(plan, Arc::clone(&state)),
        state,
        harness,
    )
}

#[tokio::test]
async fn test_running_handle_stop_is_idempotent() {
    let log = new_log();
    let (sequencer, state, harness) = sequencer(three_steps(&log));
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    state.try_begin_start().unwrap();

    let handle = sequencer.start(cancel_rx).await.unwrap();
    assert_eq!(state.current(), WorkerState::Running);
    assert_eq!(handle.subscriptions().len(), 3);
    assert!(!handle.is_stopped().await);

    handle.stop().await.unwrap();
    handle.stop().await.unwrap();

    assert!(handle.is_stopped().await);
    assert_eq!(state.current(), WorkerState::Stopped);
    assert!(!harness.transport.is_consuming());
    assert_eq!(
        entries(&log)
            .iter()
            .filter(|e| e.starts_with("teardown:"))
            .count(),
        3
    );
    assert!(sequencer
        .plan()
        .graph
        .statuses()
        .iter()
        .all(|(_, status)| *status == StepStatus::Pending));
}

#[tokio::test]
async fn test_cancel_before_first_step_runs_nothing() {
    let log = new_log();
    let (sequencer, state, harness) = sequencer(three_steps(&log));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();
    state.try_begin_start().unwrap();

    let err = sequencer.start(cancel_rx).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Cancelled { ref stage } if stage == "a"));
    assert!(entries(&log).is_empty());
    assert_eq!(state.current(), WorkerState::Stopped);
    assert_eq!(harness.transport.sessions_opened(), 0);
}

#[tokio::test]
async fn test_cancel_with_no_steps_reports_subscriptions() {
    let (sequencer, state, _harness) = sequencer(Vec::new());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();
    state.try_begin_start().unwrap();

    let err = sequencer.start(cancel_rx).await.unwrap_err();

    assert_eq!(err.failed_stage(), "subscriptions");
}

#[tokio::test]
async fn test_transport_refusal_unwinds_steps() {
    let log = new_log();
    let (sequencer, state, harness) = sequencer(three_steps(&log));
    let _elsewhere = harness.transport.start_consuming().unwrap();
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    state.try_begin_start().unwrap();

    let err = sequencer.start(cancel_rx).await.unwrap_err();

    assert!(matches!(
        err,
        BootstrapError::Transport(TransportError::AlreadyConsuming)
    ));
    assert_eq!(err.failed_stage(), "transport");
    assert!(entries(&log).ends_with(&[
        "teardown:c".to_string(),
        "teardown:b".to_string(),
        "teardown:a".to_string(),
    ]));
    assert_eq!(state.current(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_failed_step_never_starts_successors() {
    let log = new_log();
    let (sequencer, state, _harness) = sequencer(vec![
        RecordingStep::new("a", &log, Behavior::Fail),
        RecordingStep::new("b", &log, Behavior::Succeed),
    ]);
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    state.try_begin_start().unwrap();

    let err = sequencer.start(cancel_rx).await.unwrap_err();

    assert_eq!(err.failed_stage(), "a");
    assert_eq!(entries(&log), vec!["run:a"]);
    assert_eq!(
        sequencer.plan().graph.status("b"),
        Some(StepStatus::Pending)
    );
}

#[test]
fn test_duplicate_step_names_rejected() {
    let log = new_log();
    let result = DependencyGraph::from_steps(vec![
        RecordingStep::new("a", &log, Behavior::Succeed),
        RecordingStep::new("a", &log, Behavior::Succeed),
    ]);

    assert!(matches!(result, Err(GraphError::DuplicateStep(ref name)) if name == "a"));
}

/// Buffers one envelope the moment consuming starts.
struct PrimedTransport {
    inner: InMemoryTransport,
}

impl Transport for PrimedTransport {
    fn start_consuming(&self) -> Result<Inbox, TransportError> {
        let inbox = self.inner.start_consuming()?;
        self.inner
            .publish(envelope("ordering.OrderCreated", "custom"))?;
        Ok(inbox)
    }

    fn stop_consuming(&self) -> Result<(), TransportError> {
        self.inner.stop_consuming()
    }

    fn is_consuming(&self) -> bool {
        self.inner.is_consuming()
    }
}

/// Records the worker state at each dispatch.
struct StateRecordingDispatcher {
    state: Arc<WorkerStateCell>,
    seen: Mutex<Vec<WorkerState>>,
}

#[async_trait]
impl EnvelopeDispatcher for StateRecordingDispatcher {
    async fn dispatch(&self, _envelope: Envelope) -> anyhow::Result<()> {
        self.seen.lock().push(self.state.current());
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_dispatch_sees_running_state() {
    let log = new_log();
    let state = Arc::new(WorkerStateCell::new());
    let dispatcher = Arc::new(StateRecordingDispatcher {
        state: Arc::clone(&state),
        seen: Mutex::new(Vec::new()),
    });
    let plan = BootstrapPlan {
        graph: Arc::new(DependencyGraph::from_steps(three_steps(&log)).unwrap()),
        subscription_manager: in_memory_manager(),
        event_types: default_events(),
        transport: Arc::new(PrimedTransport {
            inner: InMemoryTransport::new(),
        }),
        dispatcher: dispatcher.clone(),
        filter: MessageTargetFilter::new(TargetDescriptor::new("custom").unwrap()),
        options: BootstrapOptions::default(),
    };
    let sequencer = BootstrapSequencer::new(plan, Arc::clone(&state));
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    state.try_begin_start().unwrap();

    let handle = sequencer.start(cancel_rx).await.unwrap();

    timeout(Duration::from_secs(2), async {
        while dispatcher.seen.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("envelope never dispatched");
    assert_eq!(*dispatcher.seen.lock(), vec![WorkerState::Running]);

    handle.stop().await.unwrap();
}
