//! # Dependency Graph
//!
//! The ordered list of init steps a worker brings up. Position in the list is
//! the dependency order: a step may rely on everything before it.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::bootstrap::step::{InitStep, StepStatus};
use crate::errors::{GraphError, InvalidArgument};

/// Ordered init steps plus the status of each.
///
/// Statuses are only changed by the bootstrap sequencer and its teardown
/// routine.
pub struct DependencyGraph {
    steps: Vec<Arc<dyn InitStep>>,
    statuses: RwLock<Vec<StepStatus>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            statuses: RwLock::new(Vec::new()),
        }
    }

    /// Build a graph from steps in dependency order.
    pub fn from_steps(
        steps: impl IntoIterator<Item = Arc<dyn InitStep>>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for step in steps {
            graph.push(step)?;
        }
        Ok(graph)
    }

    /// Append a step after every step already added.
    pub fn push(&mut self, step: Arc<dyn InitStep>) -> Result<(), GraphError> {
        let name = step.name();
        if name.trim().is_empty() {
            return Err(InvalidArgument::new("step", "init step name must not be blank").into());
        }
        if self.steps.iter().any(|existing| existing.name() == name) {
            return Err(GraphError::DuplicateStep(name.to_string()));
        }

        self.steps.push(step);
        self.statuses.get_mut().push(StepStatus::Pending);
        Ok(())
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Status of the named step.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<StepStatus> {
        let index = self.steps.iter().position(|s| s.name() == name)?;
        self.statuses.read().get(index).copied()
    }

    /// `(name, status)` for every step, in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<(String, StepStatus)> {
        let statuses = self.statuses.read();
        self.steps
            .iter()
            .zip(statuses.iter())
            .map(|(step, status)| (step.name().to_string(), *status))
            .collect()
    }

    pub(crate) fn step(&self, index: usize) -> &Arc<dyn InitStep> {
        &self.steps[index]
    }

    /// Mark step `index` Running. Every earlier step must be Ready.
    pub(crate) fn begin(&self, index: usize) {
        let mut statuses = self.statuses.write();
        debug_assert!(
            statuses[..index].iter().all(|s| *s == StepStatus::Ready),
            "step started before its predecessors were ready"
        );
        statuses[index] = StepStatus::Running;
    }

    pub(crate) fn set_status(&self, index: usize, status: StepStatus) {
        self.statuses.write()[index] = status;
    }

    /// Return every step to Pending ahead of a new bootstrap.
    pub(crate) fn reset(&self) {
        self.statuses
            .write()
            .iter_mut()
            .for_each(|s| *s = StepStatus::Pending);
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl InitStep for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn step(name: &'static str) -> Arc<dyn InitStep> {
        Arc::new(Named(name))
    }

    #[test]
    fn test_steps_keep_declared_order() {
        let graph =
            DependencyGraph::from_steps([step("data-access"), step("event-store"), step("process-engine")])
                .unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.names(), vec!["data-access", "event-store", "process-engine"]);
        assert!(graph
            .statuses()
            .iter()
            .all(|(_, status)| *status == StepStatus::Pending));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = DependencyGraph::from_steps([step("data-access"), step("data-access")]);
        assert_eq!(
            result.err(),
            Some(GraphError::DuplicateStep("data-access".into()))
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = DependencyGraph::from_steps([step(" ")]);
        assert!(matches!(result, Err(GraphError::InvalidArgument(_))));
    }

    #[test]
    fn test_status_tracking_and_reset() {
        let graph = DependencyGraph::from_steps([step("a"), step("b")]).unwrap();

        graph.begin(0);
        assert_eq!(graph.status("a"), Some(StepStatus::Running));
        graph.set_status(0, StepStatus::Ready);
        graph.begin(1);
        graph.set_status(1, StepStatus::Failed);

        assert_eq!(graph.status("b"), Some(StepStatus::Failed));
        assert_eq!(graph.status("missing"), None);

        graph.reset();
        assert_eq!(graph.status("a"), Some(StepStatus::Pending));
        assert_eq!(graph.status("b"), Some(StepStatus::Pending));
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::default();
        assert!(graph.is_empty());
        assert!(graph.statuses().is_empty());
    }
}
