//! ABOUTME: Atomic on-disk persistence: write-to-temp-then-rename, tolerant reads
//! ABOUTME: On-disk checkpoint layout: atomic write-to-temp-then-rename, one JSON file per checkpoint

use agentflow_core::{Checkpoint, CheckpointId, WorkflowId};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// `checkpoints/<workflow_id>/<checkpoint_id>.json`, written atomically
/// (write to a sibling temp file, then rename) so a crash mid-write never
/// leaves a partially-written checkpoint file behind.
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn dir_for(&self, workflow_id: WorkflowId) -> PathBuf {
        self.root.join("checkpoints").join(workflow_id.to_string())
    }

    fn path_for(&self, workflow_id: WorkflowId, checkpoint_id: CheckpointId) -> PathBuf {
        self.dir_for(workflow_id).join(format!("{checkpoint_id}.json"))
    }

    pub fn save(&self, workflow_id: WorkflowId, checkpoint: &Checkpoint) -> Result<(), PersistenceError> {
        let dir = self.dir_for(workflow_id);
        std::fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;
        let final_path = self.path_for(workflow_id, checkpoint.id);
        let tmp_path = final_path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        std::fs::write(&tmp_path, &bytes).map_err(|source| PersistenceError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &final_path).map_err(|source| PersistenceError::Io {
            path: final_path,
            source,
        })?;
        Ok(())
    }

    /// Reads are tolerant of partial/corrupt files: a read failure is
    /// logged and skipped rather than propagated.
    #[must_use]
    pub fn load_all(&self, workflow_id: WorkflowId) -> Vec<Checkpoint> {
        let dir = self.dir_for(workflow_id);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut loaded = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path).ok().and_then(|bytes| serde_json::from_slice(&bytes).ok()) {
                Some(checkpoint) => loaded.push(checkpoint),
                None => warn!(path = %path.display(), "skipping unreadable checkpoint file"),
            }
        }
        loaded.sort_by_key(|c: &Checkpoint| c.timestamp);
        loaded
    }

    pub fn delete(&self, workflow_id: WorkflowId, checkpoint_id: CheckpointId) {
        let path = self.path_for(workflow_id, checkpoint_id);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to delete evicted checkpoint file");
            }
        }
    }

    pub fn purge_workflow(&self, workflow_id: WorkflowId) {
        let _ = std::fs::remove_dir_all(self.dir_for(workflow_id));
    }
}

/// Write a single file atomically: temp file in the same directory, then
/// rename. Used by the file-restore path so a restore interrupted mid-write
/// cannot leave a half-written file on disk.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("restore")
    ));
    std::fs::write(&tmp_path, content).map_err(|source| PersistenceError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
