//! # Process Runtime
//!
//! Host for the process-management worker.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, `PM_CONFIG_FILE`, `PM_*` variables)
//! 2. Install logging
//! 3. Wire the worker over the in-memory bus
//! 4. Start it, wait for Ctrl+C, stop it

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use process_runtime::telemetry::init_logging;
use process_runtime::{assemble, WorkerConfig};
use shared_bus::{InMemorySubscriptionManager, InMemoryTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::load().context("failed to load worker configuration")?;
    init_logging(&config.log_level)?;

    info!(
        target_system = %config.target_system,
        events = config.event_types.len(),
        inbox = %config.inbox_uri,
        "Process-management worker starting"
    );

    let transport = Arc::new(InMemoryTransport::with_capacity(config.channel_capacity));
    let subscriptions = Arc::new(InMemorySubscriptionManager::new(config.inbox_uri.clone()));
    let assembly = assemble(&config, transport, subscriptions)?;

    assembly.worker.start().await?;

    info!("Worker is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    if let Err(e) = assembly.worker.dispose().await {
        error!(error = %e, "Shutdown finished with errors");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
