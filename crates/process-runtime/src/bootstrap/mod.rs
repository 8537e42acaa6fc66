//! # Bootstrap
//!
//! Ordered start-up of a worker's dependencies.
//!
//! ## Order
//!
//! 1. Init steps, strictly in graph order (each waits for its predecessor)
//! 2. Event subscriptions
//! 3. Transport opened, message pump spawned
//!
//! Any failure unwinds what was acquired, newest first. Shutdown of a running
//! worker uses the same unwind.

pub mod graph;
pub mod resources;
pub mod sequencer;
pub mod step;

pub use graph::DependencyGraph;
pub use resources::RunningHandle;
pub use sequencer::{BootstrapOptions, BootstrapPlan, BootstrapSequencer};
pub use step::{InitStep, StepStatus};

use tokio::sync::watch;

/// Stage name reported when subscription registration fails.
pub const SUBSCRIPTIONS_STAGE: &str = "subscriptions";

/// Stage name reported when the transport refuses to open.
pub const TRANSPORT_STAGE: &str = "transport";

/// Resolve once `cancel` holds `true`. Never resolves if the sender is gone.
pub(crate) async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
