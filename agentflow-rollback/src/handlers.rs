//! ABOUTME: Enumerated custom rollback handler table, looked up by name at restore time
//! ABOUTME: undoFileCreation, undoGitCommit, unstageFiles -- unknown handlers log and continue

use agentflow_core::{CodeChangeType, WorkflowContext};
use std::path::Path;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn dispatch(handler: &str, context: &mut WorkflowContext) -> Result<(), HandlerError> {
    match handler {
        "undoFileCreation" => undo_file_creation(context),
        "undoGitCommit" => undo_git_commit(&context.working_directory),
        "unstageFiles" => unstage_files(&context.working_directory),
        other => {
            warn!(handler = other, "unknown custom rollback handler, logging and continuing");
            Ok(())
        }
    }
}

/// Deletes the most recently created path recorded in `code_changes`. If no
/// `Create` entry exists there is nothing to undo; this is not an error.
fn undo_file_creation(context: &mut WorkflowContext) -> Result<(), HandlerError> {
    if let Some(change) = context
        .code_changes
        .iter()
        .rev()
        .find(|c| c.change_type == CodeChangeType::Create)
    {
        let path = change.file.clone();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn undo_git_commit(working_directory: &Path) -> Result<(), HandlerError> {
    let repo = git2::Repository::discover(working_directory)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    if let Ok(parent) = head_commit.parent(0) {
        repo.reset(parent.as_object(), git2::ResetType::Soft, None)?;
    }
    Ok(())
}

fn unstage_files(working_directory: &Path) -> Result<(), HandlerError> {
    let repo = git2::Repository::discover(working_directory)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    repo.reset(head_commit.as_object(), git2::ResetType::Mixed, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unknown_handler_is_a_no_op() {
        let mut context = WorkflowContext::new(PathBuf::from("."));
        assert!(dispatch("doesNotExist", &mut context).is_ok());
    }

    #[test]
    fn undo_file_creation_with_no_create_entries_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = WorkflowContext::new(dir.path().to_path_buf());
        assert!(dispatch("undoFileCreation", &mut context).is_ok());
    }
}
