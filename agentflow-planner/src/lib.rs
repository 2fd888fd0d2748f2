//! ABOUTME: Task Planner: oracle-driven plan synthesis, structural validation, and readiness gating
//! ABOUTME: Produces a fully-formed Workflow the executor can run unmodified

pub mod json_extract;
pub mod materialize;
pub mod planner;
pub mod prompts;
pub mod schema;

pub use planner::TaskPlanner;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner response could not be parsed: {0}")]
    Unparseable(String),
    #[error("plan is blocked on missing tool requirements: {missing_tools:?}")]
    Blocked { missing_tools: Vec<String> },
    #[error("plan has {actual} steps, exceeding the configured maximum of {max}")]
    TooManySteps { actual: usize, max: usize },
    #[error("oracle call failed: {0}")]
    Oracle(#[from] agentflow_core::OracleError),
    #[error("plan failed structural validation: {0}")]
    Validation(#[from] agentflow_core::CoreError),
}

pub mod prelude {
    pub use crate::{PlannerError, TaskPlanner};
}
