//! ABOUTME: Core data model and external-interface traits for the agentflow workflow engine
//! ABOUTME: Foundation layer: Workflow/Step/Context/Checkpoint types plus the boundary traits other crates implement

pub mod checkpoint;
pub mod context;
pub mod error;
pub mod ids;
pub mod result;
pub mod step;
pub mod traits;
pub mod workflow;

pub use checkpoint::{Checkpoint, FileSnapshot, GitState};
pub use context::{CodeChange, CodeChangeType, FileRecord, GitOperation, WorkflowContext};
pub use error::{CoreError, Result};
pub use ids::{CheckpointId, StepId, WorkflowId};
pub use result::{ErrorCode, LogEntry, LogLevel, StepError, StepResult, WorkflowError};
pub use step::{
    HumanInputType, RetryConfig, RollbackAction, RollbackActionKind, Step, StepStatus, StepType,
    StepVariant,
};
pub use traits::{
    looks_destructive, Oracle, OracleError, OracleOptions, ParameterDescriptor,
    RollbackController, RollbackError, StepRunner, ToolDescriptor, ToolInvocationContext,
    ToolInvocationResult, ToolRegistry,
};
pub use workflow::{Workflow, WorkflowStatus};

/// Prelude for convenient glob imports, one per crate in this workspace.
pub mod prelude {
    pub use crate::{
        Checkpoint, CodeChange, CodeChangeType, CoreError, ErrorCode, FileRecord, FileSnapshot,
        GitOperation, GitState, LogEntry, LogLevel, Oracle, OracleError, OracleOptions, Result,
        RollbackAction, RollbackActionKind, RollbackController, RollbackError, Step, StepError,
        StepId, StepResult, StepRunner, StepStatus, StepType, StepVariant, ToolDescriptor,
        ToolInvocationContext, ToolInvocationResult, ToolRegistry, Workflow, WorkflowContext,
        WorkflowError, WorkflowId, WorkflowStatus,
    };
}
