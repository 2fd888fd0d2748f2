//! ABOUTME: Errors the executor itself can raise, distinct from a workflow ending in `Failed` status
//! ABOUTME: A `Failed` workflow is a successful `run()` call; these variants are the executor's own malfunctions

use agentflow_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("workflow failed validation before execution could start: {0}")]
    Validation(#[from] CoreError),

    #[error("illegal call: {0}")]
    IllegalState(String),

    #[error("workflow persistence error: {0}")]
    Persistence(String),
}
