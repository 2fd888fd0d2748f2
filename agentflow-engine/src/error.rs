//! ABOUTME: Errors the engine facade itself can raise while wiring or driving a workflow
//! ABOUTME: Wraps the planner/executor's own error types rather than introducing a third taxonomy

use agentflow_executor::ExecutorError;
use agentflow_planner::PlannerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is missing a required collaborator: {0}")]
    Incomplete(String),

    #[error(transparent)]
    Planning(#[from] PlannerError),

    #[error(transparent)]
    Execution(#[from] ExecutorError),
}
