//! ABOUTME: VCS-only snapshot/restore path: branch, commit hash, uncommitted-change detection, hard reset
//! ABOUTME: Uses git2 to drive git plumbing directly rather than shelling out to the git binary

use agentflow_core::GitState;
use std::path::Path;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

/// `None` if `working_directory` is not inside a git repository -- callers
/// treat that as "no VCS state to snapshot", not an error.
pub fn read_git_state(working_directory: &Path) -> Option<GitState> {
    let repo = git2::Repository::discover(working_directory).ok()?;
    let head = repo.head().ok()?;
    let commit_hash = head.peel_to_commit().ok()?.id().to_string();
    let branch = head.shorthand().unwrap_or("HEAD").to_string();
    let has_uncommitted_changes = repo
        .statuses(None)
        .map(|statuses| !statuses.is_empty())
        .unwrap_or(false);
    Some(GitState {
        branch,
        commit_hash,
        has_uncommitted_changes,
    })
}

/// Stash uncommitted changes (best effort), checkout the recorded branch,
/// then hard-reset to the recorded commit. A VCS restore failure is fatal
/// to the overall restore, unlike per-file restore failures.
pub fn restore_git_state(working_directory: &Path, state: &GitState) -> Result<(), VcsError> {
    let mut repo = git2::Repository::discover(working_directory)?;

    if state.has_uncommitted_changes {
        let signature = repo
            .signature()
            .unwrap_or_else(|_| git2::Signature::now("agentflow", "agentflow@localhost").unwrap());
        if let Err(err) = repo.stash_save(&signature, "agentflow rollback autostash", None) {
            warn!(error = %err, "best-effort stash before rollback failed, continuing");
        }
    }

    let branch_ref = format!("refs/heads/{}", state.branch);
    if repo.find_reference(&branch_ref).is_ok() {
        repo.set_head(&branch_ref)?;
        repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
    }

    let target_oid = git2::Oid::from_str(&state.commit_hash)?;
    let commit = repo.find_commit(target_oid)?;
    repo.reset(commit.as_object(), git2::ResetType::Hard, None)?;
    Ok(())
}
