//! ABOUTME: Rollback Controller: checkpoint snapshot/restore, VCS state, and compensating rollback actions
//! ABOUTME: Split into manager/vcs/persistence/retention/handlers, each with one responsibility

pub mod handlers;
pub mod manager;
pub mod persistence;
pub mod retention;
pub mod vcs;

pub use manager::{git_rollback, rollback_code_changes, RollbackManager, ToolRegistryHandle};
pub use persistence::{write_file_atomic, CheckpointStore, PersistenceError};
pub use vcs::{read_git_state, restore_git_state, VcsError};

use agentflow_core::{CheckpointId, WorkflowId};

/// Observability hook for the checkpoint/rollback lifecycle. The
/// `agentflow-events` crate's `WorkflowEvent` is the externally-visible
/// event stream; this narrower enum is what `RollbackManager` emits
/// internally so it stays decoupled from the event bus crate (mirroring the
/// dependency-inversion pattern used for the `RollbackController` trait
/// itself).
#[derive(Debug, Clone)]
pub enum RollbackEvent {
    CheckpointCreated {
        workflow_id: WorkflowId,
        checkpoint_id: CheckpointId,
    },
    Started {
        workflow_id: WorkflowId,
        to_checkpoint: CheckpointId,
    },
    Completed {
        workflow_id: WorkflowId,
    },
}

pub mod prelude {
    pub use crate::{
        git_rollback, rollback_code_changes, CheckpointStore, RollbackEvent, RollbackManager,
        ToolRegistryHandle,
    };
}
