//! Stubs shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use process_runtime::{
    BootstrapOptions, BootstrapPlan, DependencyGraph, EnvelopeDispatcher, InitStep,
    MessageTargetFilter, TargetDescriptor,
};
use shared_bus::{
    Envelope, EventTypeId, InMemorySubscriptionManager, InMemoryTransport, SubscriptionManager,
    SubscriptionManagerError,
};

/// Ordered record of step activity: `run:x`, `ready:x`, `teardown:x`.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}

/// How a [`RecordingStep`] behaves.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Delay(Duration),
    Hang,
    FailTeardown,
}

pub struct RecordingStep {
    name: String,
    log: EventLog,
    behavior: Behavior,
}

impl RecordingStep {
    pub fn new(name: &str, log: &EventLog, behavior: Behavior) -> Arc<dyn InitStep> {
        Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
            behavior,
        })
    }
}

#[async_trait]
impl InitStep for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.log.lock().push(format!("run:{}", self.name));
        match self.behavior {
            Behavior::Succeed | Behavior::FailTeardown => {}
            Behavior::Fail => anyhow::bail!("{} could not connect", self.name),
            Behavior::Delay(delay) => tokio::time::sleep(delay).await,
            Behavior::Hang => std::future::pending::<()>().await,
        }
        self.log.lock().push(format!("ready:{}", self.name));
        Ok(())
    }

    async fn teardown(&self) -> anyhow::Result<()> {
        self.log.lock().push(format!("teardown:{}", self.name));
        if let Behavior::FailTeardown = self.behavior {
            anyhow::bail!("{} refused to close", self.name);
        }
        Ok(())
    }
}

/// Dispatcher that records the message types it receives.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub seen: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl EnvelopeDispatcher for RecordingDispatcher {
    async fn dispatch(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.seen.lock().push(envelope.message_type().to_string());
        Ok(())
    }
}

/// Accepts every event type except `fail_on`.
pub struct FailingSubscriptionManager {
    fail_on: EventTypeId,
    pub attempted: Mutex<Vec<EventTypeId>>,
}

impl FailingSubscriptionManager {
    pub fn new(fail_on: &str) -> Self {
        Self {
            fail_on: event(fail_on),
            attempted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SubscriptionManager for FailingSubscriptionManager {
    async fn subscribe(&self, event_type: &EventTypeId) -> Result<(), SubscriptionManagerError> {
        self.attempted.lock().push(event_type.clone());
        if *event_type == self.fail_on {
            return Err(SubscriptionManagerError::Unavailable(
                "subscription store offline".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn event(name: &str) -> EventTypeId {
    EventTypeId::new(name).expect("non-blank event type")
}

pub fn default_events() -> Vec<EventTypeId> {
    vec![
        event("ordering.OrderCreated"),
        event("invoicing.InvoiceCreated"),
        event("email.EMailSent"),
    ]
}

pub fn envelope(message_type: &str, target: &str) -> Envelope {
    Envelope::new(message_type, b"{}".to_vec()).with_header("TargetSystem", target)
}

/// Pieces of a plan the tests inspect afterwards.
pub struct Harness {
    pub transport: Arc<InMemoryTransport>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

/// Build a plan over `steps` with an in-memory transport and a recording
/// dispatcher claiming `custom`.
pub fn plan(
    steps: Vec<Arc<dyn InitStep>>,
    manager: Arc<dyn SubscriptionManager>,
    options: BootstrapOptions,
) -> (BootstrapPlan, Harness) {
    let transport = Arc::new(InMemoryTransport::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let graph = DependencyGraph::from_steps(steps).expect("unique step names");

    let plan = BootstrapPlan {
        graph: Arc::new(graph),
        subscription_manager: manager,
        event_types: default_events(),
        transport: transport.clone(),
        dispatcher: dispatcher.clone(),
        filter: MessageTargetFilter::new(TargetDescriptor::new("custom").expect("valid target")),
        options,
    };

    (
        plan,
        Harness {
            transport,
            dispatcher,
        },
    )
}

pub fn in_memory_manager() -> Arc<InMemorySubscriptionManager> {
    Arc::new(InMemorySubscriptionManager::new("memory://process-management/inbox"))
}

/// Three succeeding steps named `a`, `b`, `c`.
pub fn three_steps(log: &EventLog) -> Vec<Arc<dyn InitStep>> {
    vec![
        RecordingStep::new("a", log, Behavior::Succeed),
        RecordingStep::new("b", log, Behavior::Succeed),
        RecordingStep::new("c", log, Behavior::Succeed),
    ]
}
