//! Git operations
//!
//! Commit timestamps come from the `git` executable (`git log` has no
//! cheap equivalent for "latest commit touching this path"); the builder
//! revision is read with the gix crate.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::staleness::ModificationTimeSource;
use crate::error::GitError;

/// Latest commit time of a path, via `git log -1 --format=%ct -- <path>`
#[derive(Debug, Clone)]
pub struct GitTimestampSource {
    /// Repository working directory
    root: PathBuf,
    /// Resolved `git` executable; every lookup fails without one
    git: Option<PathBuf>,
}

impl GitTimestampSource {
    /// Locate `git` and bind it to a repository
    pub fn new(root: &Path) -> Self {
        let git = which::which("git").ok();
        if git.is_none() {
            tracing::warn!("git not found in PATH, modification times will be unknown");
        }
        Self {
            root: root.to_path_buf(),
            git,
        }
    }

    /// Repository working directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModificationTimeSource for GitTimestampSource {
    fn modified_at(&self, path: &Path) -> Result<i64, GitError> {
        let log_failed = |error: String| GitError::LogFailed {
            path: path.to_path_buf(),
            error,
        };

        let git = self.git.as_ref().ok_or(GitError::NotInstalled)?;
        let output = Command::new(git)
            .arg("-C")
            .arg(&self.root)
            .args(["log", "-1", "--format=%ct", "--"])
            .arg(path)
            .output()
            .map_err(|e| log_failed(e.to_string()))?;

        if !output.status.success() {
            return Err(log_failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_commit_time(&String::from_utf8_lossy(&output.stdout)).map_err(log_failed)
    }
}

/// Parse `%ct` output; no commit touching the path means `0`
fn parse_commit_time(stdout: &str) -> Result<i64, String> {
    let text = stdout.trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<i64>()
        .map_err(|e| format!("unexpected git log output '{text}': {e}"))
}

/// Short commit id of the repository containing `root`
pub fn head_revision(root: &Path) -> Result<String, GitError> {
    let invalid = |error: String| GitError::InvalidRepository {
        path: root.to_path_buf(),
        error,
    };

    let repo = gix::discover(root).map_err(|e| invalid(e.to_string()))?;
    let commit = repo.head_commit().map_err(|e| invalid(e.to_string()))?;
    let sha = commit.id().to_hex().to_string();
    Ok(sha.chars().take(7).collect())
}

/// Revision of the builder: the repository HEAD, else the commit it was compiled from
pub fn builder_revision(root: &Path) -> String {
    match head_revision(root) {
        Ok(revision) => revision,
        Err(e) => {
            tracing::debug!("Falling back to embedded revision: {e}");
            option_env!("VERGEN_GIT_SHA")
                .map(|sha| sha.chars().take(7).collect())
                .unwrap_or_else(|| "unknown".to_string())
        }
    }
}
