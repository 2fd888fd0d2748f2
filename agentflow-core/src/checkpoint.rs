//! ABOUTME: Checkpoint: a restorable snapshot of context, touched files, and VCS state
//! ABOUTME: Data model only -- snapshot/restore algorithms live in agentflow-rollback

use crate::context::WorkflowContext;
use crate::ids::{CheckpointId, StepId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: PathBuf,
    pub content: String,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitState {
    pub branch: String,
    pub commit_hash: String,
    pub has_uncommitted_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub step_id: StepId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context: WorkflowContext,
    pub file_snapshots: Vec<FileSnapshot>,
    pub git_state: Option<GitState>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(
        step_id: StepId,
        context: WorkflowContext,
        file_snapshots: Vec<FileSnapshot>,
        git_state: Option<GitState>,
    ) -> Self {
        Self {
            id: CheckpointId::new(),
            step_id,
            timestamp: chrono::Utc::now(),
            context,
            file_snapshots,
            git_state,
        }
    }
}
