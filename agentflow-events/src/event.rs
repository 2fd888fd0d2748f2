//! ABOUTME: The named events the executor emits over a workflow's lifetime
//! ABOUTME: One closed Rust enum, since this core has no cross-language boundary to preserve

use agentflow_core::{StepId, StepResult, Workflow, WorkflowError, WorkflowId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
    Created {
        workflow: Box<Workflow>,
    },
    Started {
        workflow_id: WorkflowId,
    },
    Paused {
        workflow_id: WorkflowId,
    },
    Resumed {
        workflow_id: WorkflowId,
    },
    Completed {
        workflow_id: WorkflowId,
        duration: Duration,
    },
    Failed {
        workflow_id: WorkflowId,
        error: WorkflowError,
    },
    Cancelled {
        workflow_id: WorkflowId,
    },
    StepStarted {
        workflow_id: WorkflowId,
        step_id: StepId,
    },
    StepCompleted {
        workflow_id: WorkflowId,
        step_id: StepId,
        result: Box<StepResult>,
    },
    StepFailed {
        workflow_id: WorkflowId,
        step_id: StepId,
        error: agentflow_core::StepError,
    },
    StepRetrying {
        workflow_id: WorkflowId,
        step_id: StepId,
        attempt: u32,
    },
    CheckpointCreated {
        workflow_id: WorkflowId,
        checkpoint_id: agentflow_core::CheckpointId,
    },
    RollbackStarted {
        workflow_id: WorkflowId,
        to_checkpoint: agentflow_core::CheckpointId,
    },
    RollbackCompleted {
        workflow_id: WorkflowId,
    },
    HumanInputRequired {
        workflow_id: WorkflowId,
        step_id: StepId,
        prompt: String,
        input_type: agentflow_core::HumanInputType,
        choices: Option<Vec<String>>,
    },
}

impl WorkflowEvent {
    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        match self {
            Self::Created { workflow } => workflow.id,
            Self::Started { workflow_id }
            | Self::Paused { workflow_id }
            | Self::Resumed { workflow_id }
            | Self::Completed { workflow_id, .. }
            | Self::Failed { workflow_id, .. }
            | Self::Cancelled { workflow_id }
            | Self::StepStarted { workflow_id, .. }
            | Self::StepCompleted { workflow_id, .. }
            | Self::StepFailed { workflow_id, .. }
            | Self::StepRetrying { workflow_id, .. }
            | Self::CheckpointCreated { workflow_id, .. }
            | Self::RollbackStarted { workflow_id, .. }
            | Self::RollbackCompleted { workflow_id }
            | Self::HumanInputRequired { workflow_id, .. } => *workflow_id,
        }
    }

    /// The dotted name used for pattern-based filtering: `workflow:started`,
    /// `step:completed`, and so on.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "workflow:created",
            Self::Started { .. } => "workflow:started",
            Self::Paused { .. } => "workflow:paused",
            Self::Resumed { .. } => "workflow:resumed",
            Self::Completed { .. } => "workflow:completed",
            Self::Failed { .. } => "workflow:failed",
            Self::Cancelled { .. } => "workflow:cancelled",
            Self::StepStarted { .. } => "step:started",
            Self::StepCompleted { .. } => "step:completed",
            Self::StepFailed { .. } => "step:failed",
            Self::StepRetrying { .. } => "step:retrying",
            Self::CheckpointCreated { .. } => "checkpoint:created",
            Self::RollbackStarted { .. } => "rollback:started",
            Self::RollbackCompleted { .. } => "rollback:completed",
            Self::HumanInputRequired { .. } => "human-input:required",
        }
    }
}
