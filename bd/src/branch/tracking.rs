//! Tracking backends: plain git vs the stacked-branch tool
//!
//! Exactly one backend is selected at startup from repository configuration;
//! call sites only ever see the [`TrackingBackend`] trait, so there are no
//! `if stacking_enabled` branches scattered through the pipeline.
//!
//! The stacked backend drives the external stack tool (`gt` by default).
//! Every invocation passes its non-interactive flag; an operation that could
//! block on a prompt is a defect here, not a recoverable condition.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use gitgate::{GitError, GitGateway, PushMode};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{Config, ForcePush, TrackingMode};

/// Failures from either backend
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("{command} failed: {stderr}")]
    ToolFailed { command: String, stderr: String },

    #[error("failed to spawn {tool}: {source}")]
    Spawn { tool: String, source: std::io::Error },
}

impl TrackError {
    /// Diagnostic text from the underlying tool, when there is any
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Git(GitError::CommandFailed { stderr, .. }) => stderr.clone(),
            Self::ToolFailed { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Which backend a lifecycle manager was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Plain,
    Stacked,
}

/// Branch operations that differ between plain git and the stack tool
///
/// Both implementations must be interchangeable: anything able to operate on
/// a real work branch takes `&dyn TrackingBackend` (usually via
/// [`BranchLifecycle`](crate::BranchLifecycle)), never a concrete backend.
#[async_trait]
pub trait TrackingBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Create `name` from `base`; stacked backends record `base` as parent
    async fn create_branch(&self, name: &str, base: &str) -> Result<(), TrackError>;

    /// Delete `name` and any tracking metadata
    async fn delete_branch(&self, name: &str) -> Result<(), TrackError>;

    /// Check out `name` in the worktree at `dir`
    async fn checkout(&self, dir: &Path, name: &str) -> Result<(), TrackError>;

    /// Recorded parent branch, `None` when untracked or trunk-based
    async fn parent(&self, name: &str) -> Result<Option<String>, TrackError>;

    /// The stack containing `name`, trunk-most first
    async fn stack(&self, name: &str) -> Result<Vec<String>, TrackError>;

    /// Publish `name`; stacked backends publish unpublished ancestors first
    async fn submit(&self, name: &str, force: bool) -> Result<(), TrackError>;

    /// Move `name` onto a new base and settle its descendants
    async fn reparent(&self, dir: &Path, name: &str, onto: &str) -> Result<(), TrackError>;
}

/// Build the backend the repository is configured for
pub fn create_backend(config: &Config, gateway: GitGateway) -> Arc<dyn TrackingBackend> {
    match config.tracking.mode {
        TrackingMode::Plain => Arc::new(PlainBackend::new(gateway, config.submit.force_push)),
        TrackingMode::Stacked => Arc::new(StackedBackend::new(gateway, &config.tracking.tool, config.submit.force_push)),
    }
}

// ---- plain ----------------------------------------------------------------

/// Plain git: no parent metadata, submit is a push
pub struct PlainBackend {
    gateway: GitGateway,
    force_push: ForcePush,
}

impl PlainBackend {
    pub fn new(gateway: GitGateway, force_push: ForcePush) -> Self {
        Self { gateway, force_push }
    }
}

#[async_trait]
impl TrackingBackend for PlainBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Plain
    }

    async fn create_branch(&self, name: &str, base: &str) -> Result<(), TrackError> {
        Ok(self.gateway.create_branch(name, base, false).await?)
    }

    async fn delete_branch(&self, name: &str) -> Result<(), TrackError> {
        Ok(self.gateway.delete_branch(name, true).await?)
    }

    async fn checkout(&self, dir: &Path, name: &str) -> Result<(), TrackError> {
        Ok(self.gateway.checkout(dir, name).await?)
    }

    async fn parent(&self, _name: &str) -> Result<Option<String>, TrackError> {
        Ok(None)
    }

    async fn stack(&self, name: &str) -> Result<Vec<String>, TrackError> {
        Ok(vec![name.to_string()])
    }

    async fn submit(&self, name: &str, force: bool) -> Result<(), TrackError> {
        // Plain path: lease by default, overwrite only on explicit force or
        // an `always` policy
        let mode = if force || self.force_push == ForcePush::Always {
            PushMode::Force
        } else {
            PushMode::ForceWithLease
        };
        Ok(self.gateway.push(name, mode).await?)
    }

    async fn reparent(&self, dir: &Path, name: &str, onto: &str) -> Result<(), TrackError> {
        self.gateway.checkout(dir, name).await?;
        Ok(self.gateway.rebase(dir, onto).await?)
    }
}

// ---- stacked --------------------------------------------------------------

/// Stack tool backend: parent/child metadata and dependency-ordered publish
pub struct StackedBackend {
    gateway: GitGateway,
    tool: String,
    repo_root: PathBuf,
    force_push: ForcePush,
}

impl StackedBackend {
    pub fn new(gateway: GitGateway, tool: &str, force_push: ForcePush) -> Self {
        let repo_root = gateway.repo_root().to_path_buf();
        Self {
            gateway,
            tool: tool.to_string(),
            repo_root,
            force_push,
        }
    }

    async fn tool_in(&self, dir: &Path, args: &[&str]) -> Result<Output, TrackError> {
        debug!(tool = %self.tool, ?args, "running stack tool");
        Command::new(&self.tool)
            .args(args)
            .arg("--no-interactive")
            .current_dir(dir)
            .output()
            .await
            .map_err(|source| TrackError::Spawn {
                tool: self.tool.clone(),
                source,
            })
    }

    /// Run the tool in the repo root and require success
    async fn tool(&self, args: &[&str]) -> Result<String, TrackError> {
        let root = self.repo_root.clone();
        let out = self.tool_in(&root, args).await?;
        if !out.status.success() {
            return Err(TrackError::ToolFailed {
                command: format!("{} {}", self.tool, args.join(" ")),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

#[async_trait]
impl TrackingBackend for StackedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Stacked
    }

    async fn create_branch(&self, name: &str, base: &str) -> Result<(), TrackError> {
        // Branch via git, then record the parent relationship
        self.gateway.create_branch(name, base, false).await?;
        self.tool(&["track", name, "--parent", base]).await?;
        info!(branch = %name, parent = %base, "tracked branch");
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), TrackError> {
        self.tool(&["delete", name, "--force"]).await?;
        Ok(())
    }

    async fn checkout(&self, dir: &Path, name: &str) -> Result<(), TrackError> {
        let out = self.tool_in(dir, &["checkout", name]).await?;
        if !out.status.success() {
            return Err(TrackError::ToolFailed {
                command: format!("{} checkout {name}", self.tool),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn parent(&self, name: &str) -> Result<Option<String>, TrackError> {
        let out = self.tool(&["parent", name]).await?;
        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(out))
    }

    async fn stack(&self, name: &str) -> Result<Vec<String>, TrackError> {
        let out = self.tool(&["stack", name]).await?;
        Ok(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    async fn submit(&self, name: &str, force: bool) -> Result<(), TrackError> {
        let mut args = vec!["submit", "--branch", name, "--no-edit"];
        // The tool's own publish force-pushes restacked ancestors; `auto`
        // keeps parity with that, `never` restricts force to the explicit flag
        if force || self.force_push != ForcePush::Never {
            args.push("--force");
        }
        self.tool(&args).await?;
        info!(branch = %name, force, "submitted stack");
        Ok(())
    }

    async fn reparent(&self, dir: &Path, name: &str, onto: &str) -> Result<(), TrackError> {
        self.checkout(dir, name).await?;
        let out = self.tool_in(dir, &["move", "--onto", onto]).await?;
        if !out.status.success() {
            return Err(TrackError::ToolFailed {
                command: format!("{} move --onto {onto}", self.tool),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        let out = self.tool_in(dir, &["restack"]).await?;
        if !out.status.success() {
            return Err(TrackError::ToolFailed {
                command: format!("{} restack", self.tool),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted backend for unit tests
    ///
    /// Records every call; `parents` drives `parent()`/`stack()` answers.
    pub struct MockBackend {
        pub kind: BackendKind,
        pub gateway: Option<GitGateway>,
        pub parents: Mutex<HashMap<String, String>>,
        pub calls: Mutex<Vec<String>>,
        pub fail_submit: Mutex<Option<String>>,
    }

    impl MockBackend {
        pub fn new(kind: BackendKind) -> Self {
            Self {
                kind,
                gateway: None,
                parents: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                fail_submit: Mutex::new(None),
            }
        }

        /// Route real git operations through `gateway`, still recording calls
        pub fn with_gateway(mut self, gateway: GitGateway) -> Self {
            self.gateway = Some(gateway);
            self
        }

        pub fn set_parent(&self, child: &str, parent: &str) {
            self.parents.lock().unwrap().insert(child.to_string(), parent.to_string());
        }

        pub fn fail_next_submit(&self, stderr: &str) {
            *self.fail_submit.lock().unwrap() = Some(stderr.to_string());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl TrackingBackend for MockBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn create_branch(&self, name: &str, base: &str) -> Result<(), TrackError> {
            self.record(format!("create {name} from {base}"));
            if let Some(g) = &self.gateway {
                g.create_branch(name, base, false).await?;
            }
            self.set_parent(name, base);
            Ok(())
        }

        async fn delete_branch(&self, name: &str) -> Result<(), TrackError> {
            self.record(format!("delete {name}"));
            if let Some(g) = &self.gateway {
                g.delete_branch(name, true).await?;
            }
            self.parents.lock().unwrap().remove(name);
            Ok(())
        }

        async fn checkout(&self, dir: &Path, name: &str) -> Result<(), TrackError> {
            self.record(format!("checkout {name}"));
            if let Some(g) = &self.gateway {
                g.checkout(dir, name).await?;
            }
            Ok(())
        }

        async fn parent(&self, name: &str) -> Result<Option<String>, TrackError> {
            Ok(self.parents.lock().unwrap().get(name).cloned())
        }

        async fn stack(&self, name: &str) -> Result<Vec<String>, TrackError> {
            let parents = self.parents.lock().unwrap();
            let mut chain = vec![name.to_string()];
            let mut cursor = name.to_string();
            while let Some(p) = parents.get(&cursor) {
                chain.push(p.clone());
                cursor = p.clone();
            }
            chain.reverse();
            Ok(chain)
        }

        async fn submit(&self, name: &str, force: bool) -> Result<(), TrackError> {
            self.record(format!("submit {name} force={force}"));
            if let Some(stderr) = self.fail_submit.lock().unwrap().take() {
                return Err(TrackError::ToolFailed {
                    command: "mock submit".to_string(),
                    stderr,
                });
            }
            Ok(())
        }

        async fn reparent(&self, _dir: &Path, name: &str, onto: &str) -> Result<(), TrackError> {
            self.record(format!("reparent {name} onto {onto}"));
            self.set_parent(name, onto);
            Ok(())
        }
    }
}
