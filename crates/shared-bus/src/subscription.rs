//! # Subscription Manager
//!
//! Records which inbox wants which event types delivered.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

/// Identifier of an event type, e.g. `ordering.OrderCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTypeId(String);

impl EventTypeId {
    /// Create an event type id. Returns `None` for a blank name.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return None;
        }
        Some(Self(name))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors reported by a subscription manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionManagerError {
    /// The backing store could not be reached.
    #[error("Subscription store unavailable: {0}")]
    Unavailable(String),

    /// The manager refused this event type.
    #[error("Subscription to {event_type} rejected: {reason}")]
    Rejected {
        /// The refused event type.
        event_type: EventTypeId,
        /// Why it was refused.
        reason: String,
    },
}

/// Accepts subscription requests on behalf of one worker inbox.
#[async_trait]
pub trait SubscriptionManager: Send + Sync {
    /// Ask for `event_type` to be delivered to this worker.
    ///
    /// Must be idempotent.
    async fn subscribe(&self, event_type: &EventTypeId) -> Result<(), SubscriptionManagerError>;
}

/// In-memory subscription manager.
///
/// Subscriptions are keyed by event type and hold the set of inbox URIs
/// that asked for it, so several workers can share one manager.
pub struct InMemorySubscriptionManager {
    inbox_uri: String,
    subscriptions: RwLock<HashMap<EventTypeId, BTreeSet<String>>>,
    subscribe_calls: AtomicU64,
}

impl InMemorySubscriptionManager {
    /// Create a manager subscribing on behalf of `inbox_uri`.
    pub fn new(inbox_uri: impl Into<String>) -> Self {
        Self {
            inbox_uri: inbox_uri.into(),
            subscriptions: RwLock::new(HashMap::new()),
            subscribe_calls: AtomicU64::new(0),
        }
    }

    /// Inbox this manager subscribes for.
    #[must_use]
    pub fn inbox_uri(&self) -> &str {
        &self.inbox_uri
    }

    /// Inbox URIs subscribed to `event_type`, sorted.
    #[must_use]
    pub fn subscribed_uris(&self, event_type: &EventTypeId) -> Vec<String> {
        self.subscriptions
            .read()
            .get(event_type)
            .map(|uris| uris.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether this manager's inbox is subscribed to `event_type`.
    #[must_use]
    pub fn is_subscribed(&self, event_type: &EventTypeId) -> bool {
        self.subscriptions
            .read()
            .get(event_type)
            .is_some_and(|uris| uris.contains(&self.inbox_uri))
    }

    /// Number of distinct event types with at least one subscriber.
    #[must_use]
    pub fn event_type_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Total `subscribe` calls received, including repeats.
    #[must_use]
    pub fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SubscriptionManager for InMemorySubscriptionManager {
    async fn subscribe(&self, event_type: &EventTypeId) -> Result<(), SubscriptionManagerError> {
        self.subscribe_calls.fetch_add(1, Ordering::Relaxed);

        let inserted = self
            .subscriptions
            .write()
            .entry(event_type.clone())
            .or_default()
            .insert(self.inbox_uri.clone());

        debug!(
            event_type = %event_type,
            inbox = %self.inbox_uri,
            new = inserted,
            "Subscription recorded"
        );
        Ok(())
    }
}
