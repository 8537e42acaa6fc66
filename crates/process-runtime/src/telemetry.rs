//! # Logging Setup
//!
//! Installs the global `tracing` subscriber for the worker binary. The
//! library itself only emits events; tests and embedding hosts install
//! their own subscriber, or none.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logging could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Neither `RUST_LOG` nor the configured level is a valid filter.
    #[error("Invalid log filter `{level}`: {reason}")]
    Filter {
        /// The configured level.
        level: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Build the filter: `RUST_LOG` when set and valid, otherwise `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| TelemetryError::Filter {
            level: level.to_string(),
            reason: e.to_string(),
        })
}

/// Install a formatted subscriber filtered by [`env_filter`].
pub fn init_logging(level: &str) -> Result<(), TelemetryError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter(level)?)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))
}
