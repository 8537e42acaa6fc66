//! Components registered by the default init steps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Connection settings shared by everything that touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAccessSettings {
    connection_name: String,
}

impl DataAccessSettings {
    /// Settings for the named connection.
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
        }
    }

    /// Connection name.
    #[must_use]
    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }
}

/// Event store bound to a data-access connection.
#[derive(Debug)]
pub struct EventStore {
    settings: DataAccessSettings,
    appended: AtomicU64,
}

impl EventStore {
    /// Open a store over `settings`.
    pub fn new(settings: DataAccessSettings) -> Self {
        Self {
            settings,
            appended: AtomicU64::new(0),
        }
    }

    /// The connection this store writes to.
    #[must_use]
    pub fn connection_name(&self) -> &str {
        self.settings.connection_name()
    }

    /// Record one appended event, returning the new total.
    pub fn record_append(&self) -> u64 {
        self.appended.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Events appended so far.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }
}

/// Projection processing layered over the event store.
#[derive(Debug)]
pub struct EventProcessingModule {
    store: Arc<EventStore>,
}

impl EventProcessingModule {
    /// Attach to `store`.
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// The store being processed.
    #[must_use]
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }
}
