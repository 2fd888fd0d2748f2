//! ABOUTME: Engine: the facade bundling planner, executor, rollback controller, and event bus
//! ABOUTME: Replaces module-level singletons with one constructible value so a process can host more than one engine

use crate::error::EngineError;
use agentflow_config::EngineConfig;
use agentflow_core::{StepId, Workflow};
use agentflow_events::{EventBus, WorkflowEvent};
use agentflow_executor::WorkflowExecutor;
use agentflow_planner::TaskPlanner;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Bundles one [`TaskPlanner`] and one [`WorkflowExecutor`] (itself already
/// wired to a rollback controller, a workflow store, and optionally an
/// event bus) behind a single handle. Construct via [`crate::EngineBuilder`].
///
/// Cheaply `Clone`-able: the executor is held behind an `Arc`, so every
/// clone drives the same underlying scheduler state for in-flight pause/
/// resume/cancel calls.
#[derive(Clone)]
pub struct Engine {
    planner: Arc<TaskPlanner>,
    executor: Arc<WorkflowExecutor>,
    config: EngineConfig,
    events: Option<EventBus>,
}

impl Engine {
    pub(crate) fn new(
        planner: TaskPlanner,
        executor: Arc<WorkflowExecutor>,
        config: EngineConfig,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            planner: Arc::new(planner),
            executor,
            config,
            events,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Turns a natural-language request into a fully-formed, unscheduled
    /// `Workflow`.
    pub async fn plan(&self, request: &str, working_directory: PathBuf) -> Result<Workflow, EngineError> {
        self.planner.plan(request, working_directory).await.map_err(EngineError::from)
    }

    /// Runs an already-planned workflow to a terminal status, mutating it
    /// in place. The caller already holds the `Workflow` value rather than
    /// looking it up by id -- a concrete persistent store is the caller's
    /// concern, and the engine's own `WorkflowStore` is a durability side
    /// effect, not a workflow registry.
    pub async fn run(&self, workflow: &mut Workflow) -> Result<(), EngineError> {
        self.executor.run(workflow).await.map_err(EngineError::from)
    }

    /// Convenience composition of `plan` followed by `run`: most callers
    /// want the workflow executed immediately after being planned. Honors
    /// `dryRunByDefault` (spec.md §6): when set, the workflow is returned
    /// right after planning, still in `Pending`, without ever dispatching a
    /// step. Callers that need to force one way or the other regardless of
    /// config should call `plan`/`run` directly.
    pub async fn plan_and_run(&self, request: &str, working_directory: PathBuf) -> Result<Workflow, EngineError> {
        let mut workflow = self.plan(request, working_directory).await?;
        if self.config.dry_run_by_default {
            return Ok(workflow);
        }
        self.run(&mut workflow).await?;
        Ok(workflow)
    }

    pub fn request_pause(&self) {
        self.executor.request_pause();
    }

    pub fn request_resume(&self) {
        self.executor.request_resume();
    }

    pub fn request_cancel(&self) {
        self.executor.request_cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.executor.is_cancelled()
    }

    /// Delivers a suspended `humanInput` step's value. Returns `false` if
    /// no step with that id is currently suspended.
    pub fn provide_input(&self, step_id: StepId, value: Value) -> bool {
        self.executor.provide_input(step_id, value)
    }

    /// Subscribes to the workflow event stream. Returns `None` if the
    /// engine was built without `with_events`/`with_event_bus`.
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<WorkflowEvent>> {
        self.events.as_ref().map(EventBus::subscribe)
    }

    /// Purges persisted workflow state older than the configured
    /// `logRetention` window (spec.md §6). Returns the number of files
    /// removed.
    pub fn purge_expired_workflows(&self) -> usize {
        self.executor.purge_expired_workflows(self.config.log_retention())
    }
}
