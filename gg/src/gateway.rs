//! Git subprocess gateway
//!
//! Every operation shells out to `git` rooted at the repository, captures
//! stdout/stderr, and maps failures to [`GitError`]. Operations are
//! idempotent where git allows it (forced delete of an absent branch is Ok).

use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::divergence::{Divergence, RemoteStatus};
use crate::error::GitError;

/// How a push is allowed to move the remote ref
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMode {
    /// Overwrite, but reject if the remote moved since last fetch
    #[default]
    ForceWithLease,
    /// Unconditional overwrite
    Force,
    /// Fast-forward only
    Plain,
}

/// Capability surface over a single repository
#[derive(Debug, Clone)]
pub struct GitGateway {
    repo_root: PathBuf,
    remote: String,
}

impl GitGateway {
    /// Open a gateway rooted at `repo_root`, verifying it is a repository
    pub async fn open(repo_root: impl Into<PathBuf>) -> Result<Self, GitError> {
        let gate = Self {
            repo_root: repo_root.into(),
            remote: "origin".to_string(),
        };

        let out = gate.git(&["rev-parse", "--git-dir"]).await?;
        if !out.status.success() {
            return Err(GitError::NotARepository(gate.repo_root.clone()));
        }

        Ok(gate)
    }

    /// Path the gateway operates from
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Name of the remote used for fetch/push/compare
    pub fn remote(&self) -> &str {
        &self.remote
    }

    // ---- subprocess plumbing ----------------------------------------------

    async fn git_in(&self, dir: &Path, args: &[&str]) -> Result<Output, GitError> {
        debug!(?args, dir = %dir.display(), "running git");
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))
    }

    async fn git(&self, args: &[&str]) -> Result<Output, GitError> {
        let root = self.repo_root.clone();
        self.git_in(&root, args).await
    }

    fn failed(args: &[&str], out: &Output) -> GitError {
        GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }
    }

    /// Run git and require success, returning trimmed stdout
    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let out = self.git(args).await?;
        if !out.status.success() {
            return Err(Self::failed(args, &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    // ---- branches ---------------------------------------------------------

    /// Create `name` pointing at `base`; `force` overwrites an existing branch
    pub async fn create_branch(&self, name: &str, base: &str, force: bool) -> Result<(), GitError> {
        let mut args = vec!["branch"];
        if force {
            args.push("-f");
        }
        args.push(name);
        args.push(base);

        let out = self.git(&args).await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("already exists") {
                return Err(GitError::BranchExists(name.to_string()));
            }
            if stderr.contains("used by worktree") || stderr.contains("checked out") {
                return Err(GitError::CheckedOutElsewhere { branch: name.to_string() });
            }
            return Err(Self::failed(&args, &out));
        }

        info!(branch = %name, base = %base, force, "created branch");
        Ok(())
    }

    /// Delete `name`; with `force`, deleting an absent branch is not an error
    pub async fn delete_branch(&self, name: &str, force: bool) -> Result<(), GitError> {
        let args = ["branch", "-D", name];
        let out = self.git(&args).await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if force && stderr.contains("not found") {
                debug!(branch = %name, "forced delete of absent branch, ignoring");
                return Ok(());
            }
            if stderr.contains("used by worktree") || stderr.contains("checked out") {
                return Err(GitError::CheckedOutElsewhere { branch: name.to_string() });
            }
            return Err(Self::failed(&args, &out));
        }

        info!(branch = %name, "deleted branch");
        Ok(())
    }

    /// Check out `name` in the worktree at `dir`
    ///
    /// Git refuses to check out a branch that is already checked out in a
    /// different worktree; that surfaces as `CheckedOutElsewhere`.
    pub async fn checkout(&self, dir: &Path, name: &str) -> Result<(), GitError> {
        let args = ["checkout", name];
        let out = self.git_in(dir, &args).await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("already checked out") || stderr.contains("already used by worktree") {
                return Err(GitError::CheckedOutElsewhere { branch: name.to_string() });
            }
            return Err(Self::failed(&args, &out));
        }

        debug!(branch = %name, dir = %dir.display(), "checked out");
        Ok(())
    }

    /// Does `name` exist as a local branch?
    pub async fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{name}");
        let out = self.git(&["show-ref", "--verify", "--quiet", &refname]).await?;
        Ok(out.status.success())
    }

    /// Does `name` exist on the remote?
    pub async fn remote_branch_exists(&self, name: &str) -> Result<bool, GitError> {
        let args = ["ls-remote", "--exit-code", "--heads", self.remote.as_str(), name];
        let out = self.git(&args[..]).await?;

        match out.status.code() {
            Some(0) => Ok(true),
            Some(2) => Ok(false),
            _ => Err(Self::failed(&args[..], &out)),
        }
    }

    /// Branch currently checked out in the worktree at `dir`
    pub async fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        let args = ["rev-parse", "--abbrev-ref", "HEAD"];
        let out = self.git_in(dir, &args).await?;
        if !out.status.success() {
            return Err(Self::failed(&args, &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Resolve a ref to its commit id
    pub async fn rev_parse(&self, refname: &str) -> Result<String, GitError> {
        self.run(&["rev-parse", refname]).await
    }

    /// Detect the mainline branch: `origin/HEAD` first, then main/master
    pub async fn trunk_branch(&self) -> Result<String, GitError> {
        if let Ok(out) = self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"]).await
            && let Some(name) = out.strip_prefix("refs/remotes/origin/")
        {
            return Ok(name.to_string());
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate).await? {
                return Ok(candidate.to_string());
            }
        }

        Err(GitError::TrunkNotFound)
    }

    // ---- worktrees --------------------------------------------------------

    /// Create a worktree at `path` with `branch` checked out
    pub async fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        let args = ["worktree", "add", path_str.as_ref(), branch];
        let out = self.git(&args).await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("already checked out") || stderr.contains("already used by worktree") {
                return Err(GitError::CheckedOutElsewhere { branch: branch.to_string() });
            }
            return Err(Self::failed(&args, &out));
        }

        info!(path = %path.display(), branch = %branch, "created worktree");
        Ok(())
    }

    /// Remove the worktree at `path`; already-removed is not an error
    pub async fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_str.as_ref());

        let out = self.git(&args).await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("is not a working tree") {
                warn!(path = %path.display(), "worktree already removed");
                return Ok(());
            }
            return Err(Self::failed(&args, &out));
        }

        info!(path = %path.display(), "removed worktree");
        Ok(())
    }

    // ---- diffs ------------------------------------------------------------

    /// Unified diff of `head` against the merge base with `base`
    pub async fn diff(&self, base: &str, head: &str) -> Result<String, GitError> {
        let range = format!("{base}...{head}");
        let args = ["diff", &range];
        let out = self.git(&args[..]).await?;
        if !out.status.success() {
            return Err(Self::failed(&args[..], &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    }

    /// Commit subjects on `head` that are not on `base`, newest first
    pub async fn log_subjects(&self, base: &str, head: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{base}..{head}");
        let out = self.run(&["log", "--format=%s", &range]).await?;
        Ok(out.lines().map(str::to_string).filter(|s| !s.is_empty()).collect())
    }

    // ---- remote -----------------------------------------------------------

    /// Fetch a single branch from the remote
    pub async fn fetch_branch(&self, name: &str) -> Result<(), GitError> {
        let args = ["fetch", self.remote.as_str(), name];
        let out = self.git(&args[..]).await?;
        if !out.status.success() {
            return Err(Self::failed(&args[..], &out));
        }
        debug!(branch = %name, "fetched");
        Ok(())
    }

    /// Ahead/behind counts against the remote-tracking ref
    ///
    /// Callers should fetch first; [`GitGateway::divergence`] does both.
    pub async fn ahead_behind(&self, branch: &str) -> Result<Divergence, GitError> {
        let range = format!("{branch}...{}/{branch}", self.remote);
        let out = self.run(&["rev-list", "--left-right", "--count", &range]).await?;

        let mut parts = out.split_whitespace();
        let (Some(ahead), Some(behind)) = (
            parts.next().and_then(|s| s.parse::<u64>().ok()),
            parts.next().and_then(|s| s.parse::<u64>().ok()),
        ) else {
            return Err(GitError::Unparsable {
                what: "ahead/behind counts".to_string(),
                output: out,
            });
        };

        Ok(Divergence { ahead, behind })
    }

    /// Compare a branch with its remote counterpart
    ///
    /// Fetches first so the answer reflects the remote as of now, which is
    /// what makes this usable as a just-before-push guard.
    pub async fn divergence(&self, branch: &str) -> Result<RemoteStatus, GitError> {
        if !self.remote_branch_exists(branch).await? {
            return Ok(RemoteStatus::NotOnRemote);
        }

        self.fetch_branch(branch).await?;
        let counts = self.ahead_behind(branch).await?;
        debug!(branch = %branch, ahead = counts.ahead, behind = counts.behind, "compared with remote");
        Ok(RemoteStatus::Compared(counts))
    }

    /// Push `branch` to the remote
    pub async fn push(&self, branch: &str, mode: PushMode) -> Result<(), GitError> {
        let mut args = vec!["push"];
        match mode {
            PushMode::ForceWithLease => args.push("--force-with-lease"),
            PushMode::Force => args.push("--force"),
            PushMode::Plain => {}
        }
        args.push(&self.remote);
        args.push(branch);

        let out = self.git(&args).await?;
        if !out.status.success() {
            return Err(Self::failed(&args, &out));
        }

        info!(branch = %branch, ?mode, "pushed");
        Ok(())
    }

    /// Rebase the branch checked out in `dir` onto `onto`
    pub async fn rebase(&self, dir: &Path, onto: &str) -> Result<(), GitError> {
        let args = ["rebase", onto];
        let out = self.git_in(dir, &args).await?;

        if !out.status.success() {
            // Leave the tree clean for whoever resolves the conflict
            let _ = self.git_in(dir, &["rebase", "--abort"]).await;
            return Err(Self::failed(&args, &out));
        }

        info!(onto = %onto, dir = %dir.display(), "rebased");
        Ok(())
    }
}
