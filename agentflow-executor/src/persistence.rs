//! ABOUTME: Atomic on-disk persistence for workflow state, one file per workflow
//! ABOUTME: Same write-to-temp-then-rename, tolerant-read discipline as agentflow-rollback's checkpoint store

use agentflow_core::{Workflow, WorkflowId, WorkflowStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// `workflows/<workflow_id>.json`, written atomically after every status
/// change so a crash mid-execution leaves the last fully-recorded state
/// rather than a half-written file.
pub struct WorkflowStore {
    root: PathBuf,
}

impl WorkflowStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, workflow_id: WorkflowId) -> PathBuf {
        self.root.join("workflows").join(format!("{workflow_id}.json"))
    }

    pub fn save(&self, workflow: &Workflow) -> Result<(), crate::error::ExecutorError> {
        let final_path = self.path_for(workflow.id);
        let dir = final_path
            .parent()
            .expect("path_for always has a parent")
            .to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| crate::error::ExecutorError::Persistence(e.to_string()))?;
        let tmp_path = final_path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(workflow)
            .map_err(|e| crate::error::ExecutorError::Persistence(e.to_string()))?;
        std::fs::write(&tmp_path, &bytes)
            .map_err(|e| crate::error::ExecutorError::Persistence(e.to_string()))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| crate::error::ExecutorError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Tolerant of a corrupt or partially-written file: logs and returns
    /// `None` rather than propagating, matching the checkpoint store's
    /// skip-with-warning reads.
    #[must_use]
    pub fn load(&self, workflow_id: WorkflowId) -> Option<Workflow> {
        let path = self.path_for(workflow_id);
        match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(workflow) => Some(workflow),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable workflow file");
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read workflow file");
                None
            }
        }
    }

    pub fn delete(&self, workflow_id: WorkflowId) {
        let path = self.path_for(workflow_id);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to delete workflow file");
            }
        }
    }

    /// Deletes every persisted workflow that reached a terminal status more
    /// than `max_age` ago, implementing the `logRetention` config knob
    /// (spec.md §6). In-flight workflows (no `completed_at`, or a non-terminal
    /// status) are never purged regardless of age. Returns the number of
    /// files removed.
    pub fn purge_terminal_older_than(&self, max_age: Duration) -> usize {
        let dir = self.root.join("workflows");
        let Ok(entries) = std::fs::read_dir(&dir) else { return 0 };
        let cutoff = chrono::Utc::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        let mut purged = 0usize;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = std::fs::read(&path) else { continue };
            let Ok(workflow) = serde_json::from_slice::<Workflow>(&bytes) else { continue };
            let is_terminal = matches!(
                workflow.status,
                WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
            );
            let Some(completed_at) = workflow.completed_at else { continue };
            if is_terminal && completed_at < cutoff {
                if std::fs::remove_file(&path).is_ok() {
                    purged += 1;
                } else {
                    warn!(path = %path.display(), "failed to purge expired workflow file");
                }
            }
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::WorkflowContext;
    use std::path::PathBuf;

    fn workflow() -> Workflow {
        Workflow::new(
            "name".into(),
            "desc".into(),
            "request".into(),
            WorkflowContext::new(PathBuf::from(".")),
        )
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().to_path_buf());
        let workflow = workflow();
        store.save(&workflow).unwrap();
        let loaded = store.load(workflow.id).unwrap();
        assert_eq!(loaded.id, workflow.id);
        assert_eq!(loaded.name, workflow.name);
    }

    #[test]
    fn load_missing_workflow_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().to_path_buf());
        assert!(store.load(WorkflowId::new()).is_none());
    }

    #[test]
    fn load_skips_corrupt_file_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().to_path_buf());
        let workflow_id = WorkflowId::new();
        let workflows_dir = dir.path().join("workflows");
        std::fs::create_dir_all(&workflows_dir).unwrap();
        std::fs::write(workflows_dir.join(format!("{workflow_id}.json")), b"not json").unwrap();
        assert!(store.load(workflow_id).is_none());
    }

    #[test]
    fn delete_is_idempotent_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().to_path_buf());
        store.delete(WorkflowId::new());
    }

    #[test]
    fn purge_removes_only_old_terminal_workflows() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().to_path_buf());

        let mut stale = workflow();
        stale.status = WorkflowStatus::Completed;
        stale.completed_at = Some(chrono::Utc::now() - chrono::Duration::days(10));
        store.save(&stale).unwrap();

        let mut fresh = workflow();
        fresh.status = WorkflowStatus::Completed;
        fresh.completed_at = Some(chrono::Utc::now());
        store.save(&fresh).unwrap();

        let mut in_flight = workflow();
        in_flight.status = WorkflowStatus::Running;
        store.save(&in_flight).unwrap();

        let purged = store.purge_terminal_older_than(Duration::from_secs(7 * 24 * 3600));
        assert_eq!(purged, 1);
        assert!(store.load(stale.id).is_none());
        assert!(store.load(fresh.id).is_some());
        assert!(store.load(in_flight.id).is_some());
    }
}
