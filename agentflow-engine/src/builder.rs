//! ABOUTME: EngineBuilder: fluent construction of an Engine from its required external collaborators
//! ABOUTME: Chainable-method construction, one call per collaborator, culminating in a fallible `build`

use crate::engine::Engine;
use crate::error::EngineError;
use agentflow_config::EngineConfig;
use agentflow_core::{Oracle, ToolRegistry};
use agentflow_events::EventBus;
use agentflow_executor::{WorkflowExecutor, WorkflowStore};
use agentflow_planner::TaskPlanner;
use agentflow_rollback::RollbackManager;
use agentflow_runner::DefaultStepRunner;
use std::path::PathBuf;
use std::sync::Arc;

/// Collects the two required external collaborators (a Tool Registry and
/// an Oracle), an optional config override, an optional
/// on-disk persistence root, and an optional event bus, then wires the
/// planner/runner/executor/rollback controller together the way the
/// engine is meant to be assembled once per process (or once per
/// logical tenant, if the caller wants more than one).
#[derive(Default)]
pub struct EngineBuilder {
    tool_registry: Option<Arc<dyn ToolRegistry>>,
    oracle: Option<Arc<dyn Oracle>>,
    config: EngineConfig,
    persistence_root: Option<PathBuf>,
    events: Option<EventBus>,
    rollback_handles_tool_actions: bool,
}

impl EngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            rollback_handles_tool_actions: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tool_registry(mut self, registry: Arc<dyn ToolRegistry>) -> Self {
        self.tool_registry = Some(registry);
        self
    }

    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Root directory for `workflows/` and `checkpoints/`. Defaults to
    /// `./.agentflow` if never set.
    #[must_use]
    pub fn persistence_root(mut self, root: PathBuf) -> Self {
        self.persistence_root = Some(root);
        self
    }

    /// Installs a workflow event bus with the default broadcast capacity.
    /// Without this, the engine still runs correctly, it just has no
    /// subscribers to `workflow:*`/`step:*`/`human-input:required` events.
    #[must_use]
    pub fn with_events(mut self) -> Self {
        self.events = Some(EventBus::new());
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// A rollback action of `type=tool` needs a registry to dispatch
    /// through; set `false` to build a rollback controller that rejects
    /// those actions instead (useful for registries that are themselves
    /// not safe to call during recovery).
    #[must_use]
    pub fn rollback_dispatches_tool_actions(mut self, enabled: bool) -> Self {
        self.rollback_handles_tool_actions = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Incomplete`] if the tool registry or oracle
    /// was never supplied.
    pub fn build(self) -> Result<Engine, EngineError> {
        let tool_registry = self
            .tool_registry
            .ok_or_else(|| EngineError::Incomplete("tool_registry".to_string()))?;
        let oracle = self
            .oracle
            .ok_or_else(|| EngineError::Incomplete("oracle".to_string()))?;
        let root = self.persistence_root.unwrap_or_else(|| PathBuf::from(".agentflow"));

        let mut rollback_manager = RollbackManager::new(root.join("checkpoints"), self.config.max_checkpoints.max(50));
        if self.rollback_handles_tool_actions {
            rollback_manager = rollback_manager.with_tool_registry(tool_registry.clone());
        }
        let rollback: Arc<dyn agentflow_core::RollbackController> = Arc::new(rollback_manager);

        let planner = TaskPlanner::new(oracle.clone(), tool_registry.clone(), self.config.max_checkpoints)
            .with_require_confirmation_for_destructive(self.config.require_confirmation_for_destructive)
            .with_max_steps(self.config.max_steps);
        let runner: Arc<dyn agentflow_core::StepRunner> = Arc::new(
            DefaultStepRunner::new(tool_registry, oracle)
                .with_verbose_logging(self.config.verbose_logging)
                .with_default_retry(self.config.default_retry_attempts, self.config.default_retry_delay_ms),
        );

        let mut executor = WorkflowExecutor::new(runner, rollback, self.config.clone());
        if let Some(events) = self.events.clone() {
            executor = executor.with_events(events);
        }
        let store = WorkflowStore::new(root.join("workflows"));
        executor = executor.with_store(store);

        Ok(Engine::new(planner, Arc::new(executor), self.config, self.events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_testing::{MockToolRegistry, ScriptedOracle};

    #[test]
    fn build_fails_without_a_tool_registry() {
        let err = EngineBuilder::new().oracle(Arc::new(ScriptedOracle::new())).build();
        assert!(matches!(err, Err(EngineError::Incomplete(field)) if field == "tool_registry"));
    }

    #[test]
    fn build_fails_without_an_oracle() {
        let err = EngineBuilder::new().tool_registry(Arc::new(MockToolRegistry::new())).build();
        assert!(matches!(err, Err(EngineError::Incomplete(field)) if field == "oracle"));
    }

    #[test]
    fn build_succeeds_with_both_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new()
            .tool_registry(Arc::new(MockToolRegistry::new()))
            .oracle(Arc::new(ScriptedOracle::new()))
            .persistence_root(dir.path().to_path_buf())
            .with_events()
            .build();
        assert!(engine.is_ok());
    }
}
