//! # Init Steps
//!
//! One named unit of bootstrap work with an optional teardown hook.

use async_trait::async_trait;
use serde::Serialize;

/// Lifecycle of a single init step.
///
/// ```text
/// [Pending] ──run──→ [Running] ──ok──→ [Ready] ──teardown──→ [Pending]
///                        │
///                        └── error / timeout / cancel ──→ [Failed]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepStatus {
    /// Not started in the current bootstrap.
    Pending,
    /// `run` is in progress.
    Running,
    /// `run` succeeded; resources are held until teardown.
    Ready,
    /// `run` failed, timed out, or was cancelled.
    Failed,
}

/// A dependency registration brought up by the bootstrap sequencer.
///
/// `run` is called at most once per bootstrap. `teardown` is called exactly
/// once for every step whose `run` succeeded, in reverse order.
#[async_trait]
pub trait InitStep: Send + Sync {
    /// Unique name within a dependency graph.
    fn name(&self) -> &str;

    /// Acquire the step's resources.
    async fn run(&self) -> anyhow::Result<()>;

    /// Release what `run` acquired. Steps holding nothing keep the default.
    async fn teardown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
