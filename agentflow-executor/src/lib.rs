//! ABOUTME: Workflow Executor crate: turns a planned Workflow into completed steps
//! ABOUTME: Dependency-driven scheduling, bounded parallelism, checkpoint policy, and rollback-backed recovery

mod error;
mod loop_expand;
mod persistence;
mod scheduler;

pub use error::ExecutorError;
pub use persistence::WorkflowStore;
pub use scheduler::WorkflowExecutor;

pub mod prelude {
    pub use crate::{ExecutorError, WorkflowExecutor, WorkflowStore};
}
