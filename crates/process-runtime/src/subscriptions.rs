//! # Subscription Registrar
//!
//! Declares the event types this worker wants delivered. Runs once per
//! bootstrap, after every init step is ready and before the transport opens.

use shared_bus::{EventTypeId, SubscriptionManager};
use tracing::{info, warn};

use crate::errors::SubscriptionError;

/// The finalized event types a worker is subscribed to.
///
/// Only [`register_subscriptions`] builds one, so holding a set means every
/// listed subscription was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    event_types: Vec<EventTypeId>,
}

impl SubscriptionSet {
    /// Event types in registration order.
    #[must_use]
    pub fn event_types(&self) -> &[EventTypeId] {
        &self.event_types
    }

    /// Whether `event_type` is part of the set.
    #[must_use]
    pub fn contains(&self, event_type: &EventTypeId) -> bool {
        self.event_types.contains(event_type)
    }

    /// Number of event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.event_types.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_types.is_empty()
    }
}

/// Subscribe to each event type in order, stopping at the first failure.
///
/// Repeated entries are subscribed once. Subscriptions accepted before a
/// failure are left in place; subscribing is idempotent, so retrying the whole
/// bootstrap is safe.
pub async fn register_subscriptions(
    manager: &dyn SubscriptionManager,
    event_types: &[EventTypeId],
) -> Result<SubscriptionSet, SubscriptionError> {
    let mut registered: Vec<EventTypeId> = Vec::with_capacity(event_types.len());

    for event_type in event_types {
        if registered.contains(event_type) {
            continue;
        }

        if let Err(cause) = manager.subscribe(event_type).await {
            warn!(event_type = %event_type, error = %cause, "Subscription failed");
            return Err(SubscriptionError {
                event_type: event_type.clone(),
                cause,
            });
        }

        info!(event_type = %event_type, "Subscribed");
        registered.push(event_type.clone());
    }

    Ok(SubscriptionSet {
        event_types: registered,
    })
}
