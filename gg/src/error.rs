//! Error types for git operations

use std::path::PathBuf;

/// Failures surfaced by [`GitGateway`](crate::GitGateway)
///
/// `BranchExists` and `CheckedOutElsewhere` are distinct variants because
/// callers probe-then-create and need to branch on them as control flow.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("branch '{branch}' is already checked out in another worktree")]
    CheckedOutElsewhere { branch: String },

    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("could not detect trunk branch (no origin/HEAD, main, or master)")]
    TrunkNotFound,

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("could not parse {what} from git output: {output:?}")]
    Unparsable { what: String, output: String },

    #[error("failed to spawn git: {0}")]
    Spawn(String),
}
