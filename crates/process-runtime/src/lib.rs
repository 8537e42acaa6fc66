//! # Process Runtime Library
//!
//! Lifecycle of a process-management worker: bring dependent services up in
//! order, register event subscriptions, then consume envelopes addressed to
//! this subsystem. The `main.rs` binary is a thin host over this library.
//!
//! ## Start-up
//!
//! ```text
//! Worker::start()
//!     │
//!     ├─→ init steps (data-access → event-store → event-processing → process-engine)
//!     ├─→ subscriptions (one per configured event type)
//!     └─→ transport.start_consuming() → MessagePump
//!                                          │
//!                                          ├─ TargetSystem ≠ ours → ignored
//!                                          └─ TargetSystem = ours → ProcessActivator
//! ```
//!
//! Any failure unwinds what was acquired, newest first, and leaves the worker
//! `Stopped` so `start` can be retried.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bootstrap;
pub mod container;
pub mod errors;
pub mod filter;
pub mod handlers;
pub mod lifecycle;
pub mod pump;
pub mod subscriptions;
pub mod telemetry;
pub mod wiring;

pub use container::config;

pub use bootstrap::{
    BootstrapOptions, BootstrapPlan, BootstrapSequencer, DependencyGraph, InitStep, RunningHandle,
    StepStatus,
};
pub use container::{ConfigError, ContainerError, ServiceContainer, WorkerConfig};
pub use errors::{
    BootstrapError, GraphError, InvalidArgument, LifecycleError, ShutdownError,
    SubscriptionError, TeardownFailure,
};
pub use filter::{is_handled_here, MessageTargetFilter, TargetDescriptor, TargetSystemExt};
pub use handlers::{ProcessActivator, ResolvingDispatcher};
pub use lifecycle::{Worker, WorkerState};
pub use pump::{DrainPolicy, EnvelopeDispatcher, MessagePump, PumpSnapshot};
pub use subscriptions::{register_subscriptions, SubscriptionSet};
pub use wiring::{assemble, WorkerAssembly};
