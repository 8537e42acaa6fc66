//! # Process Activator
//!
//! The process engine's entry point: maps each claimed envelope's message
//! type to the process that handles it.
//!
//! ```text
//! MessagePump ──claimed envelope──→ ResolvingDispatcher
//!                                          │ resolve("process-engine")
//!                                          ▼
//!                                   ProcessActivator ──→ process name
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_bus::Envelope;
use tracing::{debug, warn};

use crate::container::ServiceContainer;
use crate::pump::EnvelopeDispatcher;
use crate::wiring::EventStore;

/// Container key the process engine is registered under.
pub const PROCESS_ENGINE: &str = "process-engine";

/// Routes message types to process names.
pub struct ProcessActivator {
    mappings: BTreeMap<String, String>,
    activations: AtomicU64,
    per_process: RwLock<HashMap<String, u64>>,
    store: Option<Arc<EventStore>>,
}

impl ProcessActivator {
    /// Create an activator over `message type → process` mappings.
    pub fn new(mappings: BTreeMap<String, String>) -> Self {
        Self {
            mappings,
            activations: AtomicU64::new(0),
            per_process: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Record every activation in `store`.
    #[must_use]
    pub fn with_event_store(mut self, store: Arc<EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The process that handles `message_type`, if any.
    #[must_use]
    pub fn process_for(&self, message_type: &str) -> Option<&str> {
        self.mappings.get(message_type).map(String::as_str)
    }

    /// Activate the process for `envelope`, returning its name.
    pub fn activate(&self, envelope: &Envelope) -> anyhow::Result<&str> {
        let process = self.process_for(envelope.message_type()).ok_or_else(|| {
            anyhow!(
                "No process mapped for message type `{}`",
                envelope.message_type()
            )
        })?;

        self.activations.fetch_add(1, Ordering::Relaxed);
        *self
            .per_process
            .write()
            .entry(process.to_string())
            .or_insert(0) += 1;
        if let Some(store) = &self.store {
            store.record_append();
        }

        debug!(
            message_id = %envelope.message_id(),
            message_type = envelope.message_type(),
            process,
            "Process activated"
        );
        Ok(process)
    }

    /// Total successful activations.
    #[must_use]
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Successful activations of `process`.
    #[must_use]
    pub fn activations_for(&self, process: &str) -> u64 {
        self.per_process.read().get(process).copied().unwrap_or(0)
    }
}

#[async_trait]
impl EnvelopeDispatcher for ProcessActivator {
    async fn dispatch(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.activate(&envelope).map(|_| ())
    }
}

/// Dispatcher that looks the process engine up in the service container on
/// every envelope, so it follows whatever the init steps registered.
pub struct ResolvingDispatcher {
    container: Arc<ServiceContainer>,
}

impl ResolvingDispatcher {
    /// Create a dispatcher over `container`.
    pub fn new(container: Arc<ServiceContainer>) -> Self {
        Self { container }
    }
}

#[async_trait]
impl EnvelopeDispatcher for ResolvingDispatcher {
    async fn dispatch(&self, envelope: Envelope) -> anyhow::Result<()> {
        let activator = self
            .container
            .resolve::<ProcessActivator>(PROCESS_ENGINE)
            .inspect_err(|e| warn!(error = %e, "Process engine unavailable"))
            .context("process engine not registered")?;
        activator.dispatch(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activator() -> ProcessActivator {
        ProcessActivator::new(BTreeMap::from([
            ("ordering.OrderCreated".to_string(), "OrderProcess".to_string()),
            ("email.EMailSent".to_string(), "OrderProcess".to_string()),
        ]))
    }

    fn envelope(message_type: &str) -> Envelope {
        Envelope::new(message_type, b"{}".to_vec()).with_header("TargetSystem", "custom")
    }

    #[test]
    fn test_activate_mapped_type() {
        let activator = activator();

        assert_eq!(
            activator.activate(&envelope("ordering.OrderCreated")).unwrap(),
            "OrderProcess"
        );
        assert_eq!(activator.activations(), 1);
        assert_eq!(activator.activations_for("OrderProcess"), 1);
    }

    #[test]
    fn test_activate_unmapped_type_fails() {
        let activator = activator();

        assert!(activator.activate(&envelope("billing.Paid")).is_err());
        assert_eq!(activator.activations(), 0);
    }

    #[tokio::test]
    async fn test_resolving_dispatcher_follows_container() {
        let container = Arc::new(ServiceContainer::new());
        let dispatcher = ResolvingDispatcher::new(Arc::clone(&container));

        assert!(dispatcher
            .dispatch(envelope("ordering.OrderCreated"))
            .await
            .is_err());

        container.register(PROCESS_ENGINE, activator()).unwrap();
        dispatcher
            .dispatch(envelope("ordering.OrderCreated"))
            .await
            .unwrap();

        let registered = container
            .resolve::<ProcessActivator>(PROCESS_ENGINE)
            .unwrap();
        assert_eq!(registered.activations(), 1);
    }
}
