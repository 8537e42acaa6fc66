//! # Runtime Errors
//!
//! Typed failures surfaced by the worker's core paths.

use shared_bus::{EventTypeId, SubscriptionManagerError, TransportError};
use thiserror::Error;

use crate::lifecycle::WorkerState;

/// Boxed cause carried by step failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A required input was missing or blank.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid argument `{name}`: {reason}")]
pub struct InvalidArgument {
    /// Name of the offending argument.
    pub name: &'static str,
    /// What was wrong with it.
    pub reason: String,
}

impl InvalidArgument {
    pub(crate) fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }
}

/// Errors building a dependency graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Two steps share a name.
    #[error("Duplicate init step `{0}`")]
    DuplicateStep(String),

    /// A step name was blank.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
}

/// A single subscription registration failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Subscription to `{event_type}` failed: {cause}")]
pub struct SubscriptionError {
    /// The event type whose registration failed.
    pub event_type: EventTypeId,
    /// What the subscription manager reported.
    #[source]
    pub cause: SubscriptionManagerError,
}

/// Bootstrap failed; everything acquired so far has been released.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// An init step failed or timed out.
    #[error("Init step `{step}` failed: {source}")]
    Step {
        /// Name of the failed step.
        step: String,
        /// The step's error.
        #[source]
        source: BoxError,
    },

    /// Cancellation was requested while bootstrap was in progress.
    #[error("Bootstrap cancelled during `{stage}`")]
    Cancelled {
        /// Step name, or `subscriptions`.
        stage: String,
    },

    /// Registering subscriptions failed.
    #[error("Subscription phase failed: {0}")]
    Subscriptions(#[from] SubscriptionError),

    /// The transport refused to start consuming.
    #[error("Transport failed to open: {0}")]
    Transport(#[source] TransportError),
}

impl BootstrapError {
    /// Name of the stage that failed: a step name, `subscriptions` or `transport`.
    #[must_use]
    pub fn failed_stage(&self) -> &str {
        match self {
            Self::Step { step, .. } => step,
            Self::Cancelled { stage } => stage,
            Self::Subscriptions(_) => crate::bootstrap::SUBSCRIPTIONS_STAGE,
            Self::Transport(_) => crate::bootstrap::TRANSPORT_STAGE,
        }
    }

    /// The event type that failed to subscribe, if that was the failure.
    #[must_use]
    pub fn failed_event_type(&self) -> Option<&EventTypeId> {
        match self {
            Self::Subscriptions(e) => Some(&e.event_type),
            _ => None,
        }
    }
}

/// A teardown hook that reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// Step or resource name.
    pub resource: String,
    /// Rendered error.
    pub message: String,
}

/// Shutdown finished, but some teardown hooks failed.
///
/// Every resource was still released exactly once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} teardown hook(s) failed: {}", .failures.len(), render(.failures))]
pub struct ShutdownError {
    /// Failures in the order they happened.
    pub failures: Vec<TeardownFailure>,
}

fn render(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.resource, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the worker's public lifecycle surface.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The call is not allowed in the current state.
    #[error("Cannot {operation} worker in state {state:?}")]
    InvalidState {
        /// The refused operation.
        operation: &'static str,
        /// State at the time of the call.
        state: WorkerState,
    },

    /// Bootstrap failed and was unwound.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// Shutdown completed with teardown errors.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_error_names_step() {
        let err = BootstrapError::Step {
            step: "event-store".into(),
            source: "connection refused".into(),
        };
        assert_eq!(err.failed_stage(), "event-store");
        assert!(err.to_string().contains("connection refused"));
        assert!(err.failed_event_type().is_none());
    }

    #[test]
    fn test_bootstrap_error_names_event_type() {
        let event_type = EventTypeId::new("email.EMailSent").unwrap();
        let err = BootstrapError::from(SubscriptionError {
            event_type: event_type.clone(),
            cause: SubscriptionManagerError::Unavailable("down".into()),
        });
        assert_eq!(err.failed_stage(), "subscriptions");
        assert_eq!(err.failed_event_type(), Some(&event_type));
    }

    #[test]
    fn test_shutdown_error_lists_failures() {
        let err = ShutdownError {
            failures: vec![TeardownFailure {
                resource: "data-access".into(),
                message: "pool busy".into(),
            }],
        };
        assert_eq!(err.to_string(), "1 teardown hook(s) failed: data-access: pool busy");
    }
}
