//! ABOUTME: RollbackController implementation: snapshot/restore orchestration, the coordinating component
//! ABOUTME: Coordinates checkpoint creation, retention, and restore behind the RollbackController trait

use crate::persistence::{write_file_atomic, CheckpointStore};
use crate::retention::evict_oldest;
use crate::vcs::{read_git_state, restore_git_state};
use crate::{handlers, RollbackEvent};
use agentflow_core::{
    Checkpoint, CodeChangeType, FileSnapshot, RollbackAction, RollbackActionKind,
    RollbackController, RollbackError, StepId, ToolInvocationContext, ToolInvocationResult,
    ToolRegistry, WorkflowContext, WorkflowId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Subset of a tool registry the rollback controller needs: only enough to
/// invoke a `type=tool` rollback action.
pub type ToolRegistryHandle = Arc<dyn ToolRegistry>;

pub struct RollbackManager {
    store: CheckpointStore,
    max_snapshots: usize,
    tool_registry: Option<ToolRegistryHandle>,
    event_sink: Option<Arc<dyn Fn(RollbackEvent) + Send + Sync>>,
    checkpoints_by_workflow: Mutex<HashMap<WorkflowId, Vec<Checkpoint>>>,
}

impl RollbackManager {
    #[must_use]
    pub fn new(persistence_root: PathBuf, max_snapshots: usize) -> Self {
        Self {
            store: CheckpointStore::new(persistence_root),
            max_snapshots,
            tool_registry: None,
            event_sink: None,
            checkpoints_by_workflow: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_tool_registry(mut self, registry: ToolRegistryHandle) -> Self {
        self.tool_registry = Some(registry);
        self
    }

    fn snapshot_files(context: &WorkflowContext) -> Vec<FileSnapshot> {
        let mut snapshots = Vec::new();
        for path in context.distinct_code_change_paths() {
            let exists = path.exists();
            let content = if exists {
                std::fs::read_to_string(&path).unwrap_or_default()
            } else {
                String::new()
            };
            snapshots.push(FileSnapshot {
                path,
                content,
                exists,
            });
        }
        snapshots
    }

    /// Purges every persisted checkpoint for a workflow, used when a
    /// workflow is explicitly deleted.
    pub fn purge_workflow(&self, workflow_id: WorkflowId) {
        self.store.purge_workflow(workflow_id);
        self.checkpoints_by_workflow.lock().remove(&workflow_id);
    }

    #[must_use]
    pub fn checkpoints_for(&self, workflow_id: WorkflowId) -> Vec<Checkpoint> {
        self.checkpoints_by_workflow
            .lock()
            .get(&workflow_id)
            .cloned()
            .unwrap_or_default()
    }

    fn emit(&self, event: RollbackEvent) {
        if let Some(sink) = &self.event_sink {
            sink(event);
        }
    }
}

#[async_trait]
impl RollbackController for RollbackManager {
    async fn create_checkpoint(
        &self,
        workflow_id: WorkflowId,
        step_id: StepId,
        context: &WorkflowContext,
    ) -> Result<Checkpoint, RollbackError> {
        let file_snapshots = Self::snapshot_files(context);
        let git_state = read_git_state(&context.working_directory);
        let checkpoint = Checkpoint::new(step_id, context.clone(), file_snapshots, git_state);

        self.store
            .save(workflow_id, &checkpoint)
            .map_err(|e| RollbackError::Snapshot(e.to_string()))?;

        let mut guard = self.checkpoints_by_workflow.lock();
        let list = guard.entry(workflow_id).or_default();
        list.push(checkpoint.clone());

        let evicted = evict_oldest(list, self.max_snapshots);
        for id in &evicted {
            self.store.delete(workflow_id, *id);
        }
        list.retain(|c| !evicted.contains(&c.id));
        drop(guard);

        info!(workflow_id = %workflow_id, checkpoint_id = %checkpoint.id, "checkpoint created");
        self.emit(RollbackEvent::CheckpointCreated {
            workflow_id,
            checkpoint_id: checkpoint.id,
        });
        Ok(checkpoint)
    }

    async fn rollback_to_checkpoint(
        &self,
        workflow_id: WorkflowId,
        checkpoint: &Checkpoint,
        context: &mut WorkflowContext,
    ) -> Result<(), RollbackError> {
        self.emit(RollbackEvent::Started {
            workflow_id,
            to_checkpoint: checkpoint.id,
        });

        for snapshot in &checkpoint.file_snapshots {
            let result = if snapshot.exists {
                write_file_atomic(&snapshot.path, &snapshot.content)
            } else if snapshot.path.exists() {
                std::fs::remove_file(&snapshot.path).map_err(|source| {
                    crate::persistence::PersistenceError::Io {
                        path: snapshot.path.clone(),
                        source,
                    }
                })
            } else {
                Ok(())
            };
            if let Err(err) = result {
                warn!(path = %snapshot.path.display(), error = %err, "per-file restore failed, continuing");
            }
        }

        if let Some(git_state) = &checkpoint.git_state {
            restore_git_state(&context.working_directory, git_state)
                .map_err(|e| RollbackError::Restore(e.to_string()))?;
        }

        *context = checkpoint.context.clone();
        context.truncate_code_changes_at(checkpoint.timestamp);

        self.emit(RollbackEvent::Completed { workflow_id });
        Ok(())
    }

    async fn execute_rollback_action(
        &self,
        action: &RollbackAction,
        context: &mut WorkflowContext,
    ) -> Result<(), RollbackError> {
        match &action.action {
            RollbackActionKind::Tool { name, parameters } => {
                let Some(registry) = &self.tool_registry else {
                    return Err(RollbackError::Restore(
                        "no tool registry configured for a tool-type rollback action".into(),
                    ));
                };
                let ctx = ToolInvocationContext {
                    working_directory: context.working_directory.clone(),
                    cancel_signal: CancellationToken::new(),
                };
                let result: ToolInvocationResult =
                    registry.execute(name, parameters.clone(), ctx).await;
                if !result.success {
                    return Err(RollbackError::Restore(
                        result.error.unwrap_or_else(|| "rollback tool invocation failed".into()),
                    ));
                }
                Ok(())
            }
            RollbackActionKind::Custom { handler } => {
                handlers::dispatch(handler, context).map_err(|e| RollbackError::Restore(e.to_string()))
            }
        }
    }
}

/// `rollbackCodeChanges`: walks `code_changes` in reverse insertion order,
/// restoring each entry best-effort. Deletes and modifies without captured
/// original content cannot be undone by the controller alone and are
/// skipped with a warning -- the checkpoint mechanism is the primary
/// recovery path; this is a narrower, file-change-only compensating
/// action.
pub fn rollback_code_changes(context: &WorkflowContext) -> Vec<String> {
    let mut warnings = Vec::new();
    for change in context.code_changes.iter().rev() {
        match change.change_type {
            CodeChangeType::Create => {
                if change.file.exists() {
                    if let Err(err) = std::fs::remove_file(&change.file) {
                        warnings.push(format!("failed to remove created file {:?}: {err}", change.file));
                    }
                }
            }
            CodeChangeType::Delete | CodeChangeType::Modify => {
                let original = context
                    .files
                    .iter()
                    .find(|f| f.path == change.file)
                    .and_then(|f| f.original_content.as_deref());
                match original {
                    Some(content) => {
                        if let Err(err) = write_file_atomic(&change.file, content) {
                            warnings.push(format!("failed to restore {:?}: {err}", change.file));
                        }
                    }
                    None => warnings.push(format!(
                        "cannot undo {:?} for {:?}: no captured original content",
                        change.change_type, change.file
                    )),
                }
            }
            CodeChangeType::Rename => {
                if let Some(original_path) = &change.original_path {
                    if change.file.exists() {
                        if let Err(err) = std::fs::rename(&change.file, original_path) {
                            warnings.push(format!("failed to reverse rename of {:?}: {err}", change.file));
                        }
                    }
                }
            }
        }
    }
    for warning in &warnings {
        warn!("{warning}");
    }
    warnings
}

/// `gitRollback`: a VCS-only rollback path, independent of a full
/// checkpoint restore -- hard-resets to `commit_hash` with no file-snapshot
/// or context involvement.
pub fn git_rollback(working_directory: &std::path::Path, commit_hash: &str) -> Result<(), RollbackError> {
    let repo = git2::Repository::discover(working_directory)
        .map_err(|e| RollbackError::Restore(e.to_string()))?;
    let oid = git2::Oid::from_str(commit_hash).map_err(|e| RollbackError::Restore(e.to_string()))?;
    let commit = repo.find_commit(oid).map_err(|e| RollbackError::Restore(e.to_string()))?;
    repo.reset(commit.as_object(), git2::ResetType::Hard, None)
        .map_err(|e| RollbackError::Restore(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::{CodeChange, FileRecord};
    use chrono::Utc;

    fn base_context(dir: &std::path::Path) -> WorkflowContext {
        WorkflowContext::new(dir.to_path_buf())
    }

    #[tokio::test]
    async fn checkpoint_round_trips_file_state() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        std::fs::write(&file_path, "1").unwrap();

        let mut context = base_context(dir.path());
        context.code_changes.push(CodeChange {
            file: file_path.clone(),
            change_type: CodeChangeType::Create,
            original_path: None,
            diff: None,
            timestamp: Utc::now(),
        });

        let manager = RollbackManager::new(dir.path().join("store"), 50);
        let workflow_id = WorkflowId::new();
        let checkpoint = manager
            .create_checkpoint(workflow_id, StepId::new(), &context)
            .await
            .unwrap();

        std::fs::write(&file_path, "2").unwrap();
        let mut live_context = context.clone();
        manager
            .rollback_to_checkpoint(workflow_id, &checkpoint, &mut live_context)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "1");
    }

    #[tokio::test]
    async fn restore_deletes_files_that_did_not_exist_at_snapshot_time() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("new.txt");

        let mut context = base_context(dir.path());
        context.code_changes.push(CodeChange {
            file: file_path.clone(),
            change_type: CodeChangeType::Create,
            original_path: None,
            diff: None,
            timestamp: Utc::now(),
        });

        let manager = RollbackManager::new(dir.path().join("store"), 50);
        let workflow_id = WorkflowId::new();
        let checkpoint = manager
            .create_checkpoint(workflow_id, StepId::new(), &context)
            .await
            .unwrap();

        std::fs::write(&file_path, "created after checkpoint").unwrap();
        let mut live_context = context.clone();
        manager
            .rollback_to_checkpoint(workflow_id, &checkpoint, &mut live_context)
            .await
            .unwrap();

        assert!(!file_path.exists());
    }

    #[test]
    fn rollback_code_changes_warns_on_unrecoverable_modify() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = base_context(dir.path());
        context.code_changes.push(CodeChange {
            file: dir.path().join("missing.txt"),
            change_type: CodeChangeType::Modify,
            original_path: None,
            diff: None,
            timestamp: Utc::now(),
        });
        let warnings = rollback_code_changes(&context);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no captured original content"));
    }

    #[test]
    fn rollback_code_changes_restores_modify_with_captured_original() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("b.txt");
        std::fs::write(&file_path, "new content").unwrap();

        let mut context = base_context(dir.path());
        context.files.push(FileRecord {
            path: file_path.clone(),
            content: Some("new content".into()),
            language: None,
            original_content: Some("original".into()),
        });
        context.code_changes.push(CodeChange {
            file: file_path.clone(),
            change_type: CodeChangeType::Modify,
            original_path: None,
            diff: None,
            timestamp: Utc::now(),
        });

        let warnings = rollback_code_changes(&context);
        assert!(warnings.is_empty());
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "original");
    }

    #[test]
    fn fifo_eviction_keeps_checkpoint_count_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let manager = RollbackManager::new(dir.path().join("store"), 2);
        let workflow_id = WorkflowId::new();
        let rt = tokio::runtime::Runtime::new().unwrap();
        for _ in 0..5 {
            let context = base_context(dir.path());
            rt.block_on(manager.create_checkpoint(workflow_id, StepId::new(), &context))
                .unwrap();
        }
        assert_eq!(manager.checkpoints_for(workflow_id).len(), 2);
    }
}
