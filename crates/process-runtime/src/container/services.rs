//! # Service Container
//!
//! Named, type-erased components registered by init steps and resolved by
//! the steps (and handlers) that come after them.
//!
//! ## Thread Safety
//!
//! - Components are stored as `Arc<dyn Any + Send + Sync>`
//! - The registry sits behind a `parking_lot::RwLock`; resolves only read

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

type Component = Arc<dyn Any + Send + Sync>;

/// Errors from the service container.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContainerError {
    /// A component is already registered under this key.
    #[error("Component `{0}` is already registered")]
    AlreadyRegistered(String),

    /// Nothing is registered under this key.
    #[error("Component `{0}` is not registered")]
    Missing(String),

    /// Registered, but not of the requested type.
    #[error("Component `{key}` is not a `{expected}`")]
    WrongType {
        /// Registration key.
        key: String,
        /// Requested type name.
        expected: &'static str,
    },
}

/// Registry of the worker's dependent services.
#[derive(Default)]
pub struct ServiceContainer {
    components: RwLock<HashMap<String, Component>>,
}

impl ServiceContainer {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` under `key`.
    pub fn register<T>(&self, key: impl Into<String>, component: T) -> Result<(), ContainerError>
    where
        T: Any + Send + Sync,
    {
        self.register_component(key, Arc::new(component))
    }

    /// Register an already shared component under `key`.
    pub fn register_component(
        &self,
        key: impl Into<String>,
        component: Component,
    ) -> Result<(), ContainerError> {
        let key = key.into();
        let mut components = self.components.write();
        if components.contains_key(&key) {
            return Err(ContainerError::AlreadyRegistered(key));
        }
        debug!(component = %key, "Component registered");
        components.insert(key, component);
        Ok(())
    }

    /// Resolve the component under `key` as a `T`.
    pub fn resolve<T>(&self, key: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let component = self
            .components
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContainerError::Missing(key.to_string()))?;

        component
            .downcast::<T>()
            .map_err(|_| ContainerError::WrongType {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Whether anything is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.components.read().contains_key(key)
    }

    /// Remove the component under `key`. Returns whether one was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.components.write().remove(key).is_some();
        if removed {
            debug!(component = %key, "Component removed");
        }
        removed
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.components.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    /// Whether the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}
