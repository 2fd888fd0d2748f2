//! ABOUTME: Tempdir-backed git sandbox for rollback/VCS integration tests
//! ABOUTME: Wraps the real `git` CLI rather than faking git2, matching the rollback crate's own test idiom

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A throwaway git repository on disk. Held alive for the lifetime of the
/// test via the embedded `TempDir`.
pub struct GitSandbox {
    dir: TempDir,
}

impl GitSandbox {
    /// Creates an empty repository with a committer identity configured,
    /// ready for `write` + `commit`.
    #[must_use]
    pub fn init() -> Self {
        let dir = tempfile::tempdir().expect("create sandbox tempdir");
        run(dir.path(), &["init", "-q"]);
        run(dir.path(), &["config", "user.email", "sandbox@example.com"]);
        run(dir.path(), &["config", "user.name", "sandbox"]);
        Self { dir }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative_path: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write sandbox file");
        path
    }

    pub fn commit(&self, message: &str) -> String {
        run(self.dir.path(), &["add", "-A"]);
        run(self.dir.path(), &["commit", "-q", "-m", message, "--allow-empty"]);
        self.head_commit()
    }

    #[must_use]
    pub fn head_commit(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(self.dir.path())
            .output()
            .expect("git rev-parse");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[must_use]
    pub fn current_branch(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(self.dir.path())
            .output()
            .expect("git rev-parse --abbrev-ref");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

fn run(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap_or_else(|e| panic!("failed to spawn git {args:?}: {e}"));
    assert!(status.success(), "git {args:?} failed in sandbox");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_commits_are_inspectable() {
        let sandbox = GitSandbox::init();
        sandbox.write("a.txt", "hello");
        let first = sandbox.commit("initial");
        sandbox.write("a.txt", "world");
        let second = sandbox.commit("update");
        assert_ne!(first, second);
        assert_eq!(sandbox.head_commit(), second);
    }
}
