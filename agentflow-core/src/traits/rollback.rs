//! ABOUTME: Rollback Controller interface consumed by the executor, kept behind a trait object to avoid a cyclic crate dependency
//! ABOUTME: Concrete implementation lives in agentflow-rollback

use crate::checkpoint::Checkpoint;
use crate::context::WorkflowContext;
use crate::ids::{StepId, WorkflowId};
use crate::step::RollbackAction;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("snapshot failed: {0}")]
    Snapshot(String),
    #[error("restore failed: {0}")]
    Restore(String),
}

#[async_trait]
pub trait RollbackController: Send + Sync {
    /// Persists the checkpoint atomically before returning. A snapshot
    /// failure is fatal to whatever operation requested it.
    async fn create_checkpoint(
        &self,
        workflow_id: WorkflowId,
        step_id: StepId,
        context: &WorkflowContext,
    ) -> Result<Checkpoint, RollbackError>;

    /// Mutates `context` in place to the snapshot, restores files, and
    /// restores VCS state. A restore that runs to completion is considered
    /// complete even if individual file restores logged warnings; only a
    /// VCS restore failure is fatal.
    async fn rollback_to_checkpoint(
        &self,
        workflow_id: WorkflowId,
        checkpoint: &Checkpoint,
        context: &mut WorkflowContext,
    ) -> Result<(), RollbackError>;

    async fn execute_rollback_action(
        &self,
        action: &RollbackAction,
        context: &mut WorkflowContext,
    ) -> Result<(), RollbackError>;
}
