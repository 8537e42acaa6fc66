//! # Worker Wiring
//!
//! Builds the default process-management worker from a [`WorkerConfig`].
//!
//! ## Init Steps (in order)
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │ data-access │ → │ event-store │ → │ event-processing │ → │ process-engine │
//! └─────────────┘   └─────────────┘   └──────────────────┘   └────────────────┘
//! ```
//!
//! Each step registers one component in the [`ServiceContainer`] and refuses
//! to run unless its predecessor's component is present. The message pump
//! resolves the process engine from the container on every envelope.

pub mod components;
pub mod registration;

pub use components::{DataAccessSettings, EventProcessingModule, EventStore};
pub use registration::{ComponentFactory, RegistrationStep};

use std::any::Any;
use std::sync::Arc;

use shared_bus::{SubscriptionManager, Transport};

use crate::bootstrap::{BootstrapPlan, DependencyGraph, InitStep};
use crate::container::{ServiceContainer, WorkerConfig};
use crate::errors::GraphError;
use crate::filter::MessageTargetFilter;
use crate::handlers::{ProcessActivator, ResolvingDispatcher, PROCESS_ENGINE};
use crate::lifecycle::Worker;

/// Container key for [`DataAccessSettings`].
pub const DATA_ACCESS: &str = "data-access";
/// Container key for [`EventStore`].
pub const EVENT_STORE: &str = "event-store";
/// Container key for [`EventProcessingModule`].
pub const EVENT_PROCESSING: &str = "event-processing";

type Component = Arc<dyn Any + Send + Sync>;

/// The default init steps, in dependency order.
pub fn default_steps(
    config: &WorkerConfig,
    container: &Arc<ServiceContainer>,
) -> Vec<Arc<dyn InitStep>> {
    let connection_name = config.connection_name.clone();
    let mappings = config.process_mappings.clone();

    let steps = vec![
        RegistrationStep::new(
            DATA_ACCESS,
            Arc::clone(container),
            move |_| -> anyhow::Result<Component> {
                Ok(Arc::new(DataAccessSettings::new(connection_name.clone())))
            },
        ),
        RegistrationStep::new(
            EVENT_STORE,
            Arc::clone(container),
            |c: &ServiceContainer| -> anyhow::Result<Component> {
                let settings = c.resolve::<DataAccessSettings>(DATA_ACCESS)?;
                Ok(Arc::new(EventStore::new((*settings).clone())))
            },
        )
        .requires(DATA_ACCESS),
        RegistrationStep::new(
            EVENT_PROCESSING,
            Arc::clone(container),
            |c: &ServiceContainer| -> anyhow::Result<Component> {
                let store = c.resolve::<EventStore>(EVENT_STORE)?;
                Ok(Arc::new(EventProcessingModule::new(store)))
            },
        )
        .requires(EVENT_STORE),
        RegistrationStep::new(
            PROCESS_ENGINE,
            Arc::clone(container),
            move |c: &ServiceContainer| -> anyhow::Result<Component> {
                let processing = c.resolve::<EventProcessingModule>(EVENT_PROCESSING)?;
                let activator = ProcessActivator::new(mappings.clone())
                    .with_event_store(Arc::clone(processing.store()));
                Ok(Arc::new(activator))
            },
        )
        .requires(EVENT_PROCESSING),
    ];

    steps
        .into_iter()
        .map(|step| Arc::new(step) as Arc<dyn InitStep>)
        .collect()
}

/// A worker plus the container its steps fill.
pub struct WorkerAssembly {
    /// The worker, stopped.
    pub worker: Worker,
    /// Components registered while the worker runs.
    pub container: Arc<ServiceContainer>,
}

/// Wire the default worker over `transport` and `subscription_manager`.
pub fn assemble(
    config: &WorkerConfig,
    transport: Arc<dyn Transport>,
    subscription_manager: Arc<dyn SubscriptionManager>,
) -> Result<WorkerAssembly, GraphError> {
    let container = Arc::new(ServiceContainer::new());
    let graph = DependencyGraph::from_steps(default_steps(config, &container))?;

    let plan = BootstrapPlan {
        graph: Arc::new(graph),
        subscription_manager,
        event_types: config.event_types.clone(),
        transport,
        dispatcher: Arc::new(ResolvingDispatcher::new(Arc::clone(&container))),
        filter: MessageTargetFilter::new(config.target_system.clone()),
        options: config.bootstrap_options(),
    };

    Ok(WorkerAssembly {
        worker: Worker::new(plan),
        container,
    })
}
