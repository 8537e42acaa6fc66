//! # Registration Steps
//!
//! An [`InitStep`] that builds one component, registers it in the
//! [`ServiceContainer`] and removes it again on teardown.

use std::any::Any;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tracing::debug;

use crate::bootstrap::InitStep;
use crate::container::ServiceContainer;

/// Builds a component from what earlier steps registered.
pub type ComponentFactory = Box<
    dyn Fn(&ServiceContainer) -> anyhow::Result<Arc<dyn Any + Send + Sync>> + Send + Sync,
>;

/// Registers the component named after the step.
pub struct RegistrationStep {
    name: String,
    requires: Vec<String>,
    container: Arc<ServiceContainer>,
    factory: ComponentFactory,
}

impl RegistrationStep {
    /// Create a step that registers `factory`'s output under `name`.
    pub fn new<F>(name: impl Into<String>, container: Arc<ServiceContainer>, factory: F) -> Self
    where
        F: Fn(&ServiceContainer) -> anyhow::Result<Arc<dyn Any + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            requires: Vec::new(),
            container,
            factory: Box::new(factory),
        }
    }

    /// Refuse to run unless `key` is already registered.
    #[must_use]
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.requires.push(key.into());
        self
    }

    /// Keys this step needs before it runs.
    #[must_use]
    pub fn requirements(&self) -> &[String] {
        &self.requires
    }
}

#[async_trait]
impl InitStep for RegistrationStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        if let Some(missing) = self
            .requires
            .iter()
            .find(|key| !self.container.contains(key))
        {
            bail!("`{}` requires `{missing}`, which is not registered", self.name);
        }

        let component = (self.factory)(&self.container)?;
        self.container.register_component(self.name.clone(), component)?;
        debug!(component = %self.name, "Registration complete");
        Ok(())
    }

    async fn teardown(&self) -> anyhow::Result<()> {
        if !self.container.remove(&self.name) {
            bail!("`{}` was not registered at teardown", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_step(name: &str, container: &Arc<ServiceContainer>) -> RegistrationStep {
        RegistrationStep::new(name, Arc::clone(container), |_| Ok(Arc::new(())))
    }

    #[tokio::test]
    async fn test_run_registers_and_teardown_removes() {
        let container = Arc::new(ServiceContainer::new());
        let step = unit_step("data-access", &container);

        step.run().await.unwrap();
        assert!(container.contains("data-access"));

        step.teardown().await.unwrap();
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_missing_requirement_refuses_to_run() {
        let container = Arc::new(ServiceContainer::new());
        let step = unit_step("event-store", &container).requires("data-access");

        let err = step.run().await.unwrap_err();
        assert!(err.to_string().contains("data-access"));
        assert!(!container.contains("event-store"));
    }

    #[tokio::test]
    async fn test_factory_error_propagates() {
        let container = Arc::new(ServiceContainer::new());
        let step = RegistrationStep::new("broken", Arc::clone(&container), |_| {
            anyhow::bail!("connection refused")
        });

        let err = step.run().await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_without_teardown_fails() {
        let container = Arc::new(ServiceContainer::new());
        let step = unit_step("data-access", &container);

        step.run().await.unwrap();
        assert!(step.run().await.is_err());
    }
}
