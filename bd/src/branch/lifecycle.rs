//! Branch lifecycle manager
//!
//! Routes each operation to the plain gateway or the tracking backend.
//!
//! The routing rule is the load-bearing invariant of this module:
//!
//! - `checkout` ALWAYS goes through the backend, for every branch including
//!   placeholders, so tracking-mode behavior applies uniformly.
//! - Placeholder `create`/`delete` ALWAYS bypass the backend and hit the
//!   plain gateway directly. Placeholders are not real work: letting them
//!   acquire tracking metadata would pollute stack views and stack submits,
//!   and raw-deleting a tracked branch would leave the tool's metadata
//!   dangling.

use std::path::Path;
use std::sync::Arc;

use gitgate::GitGateway;
use tracing::debug;

use super::name::is_placeholder;
use super::tracking::{BackendKind, TrackError, TrackingBackend};

/// One lifecycle per repository; all branch operations funnel through here
pub struct BranchLifecycle {
    gateway: GitGateway,
    backend: Arc<dyn TrackingBackend>,
}

impl BranchLifecycle {
    pub fn new(gateway: GitGateway, backend: Arc<dyn TrackingBackend>) -> Self {
        Self { gateway, backend }
    }

    /// The plain gateway, for callers needing raw queries (diff, divergence)
    pub fn gateway(&self) -> &GitGateway {
        &self.gateway
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Create `name` from `base`
    pub async fn create(&self, name: &str, base: &str) -> Result<(), TrackError> {
        if is_placeholder(name) {
            debug!(branch = %name, "placeholder create bypasses tracking backend");
            return Ok(self.gateway.create_branch(name, base, false).await?);
        }
        self.backend.create_branch(name, base).await
    }

    /// Delete `name`
    pub async fn delete(&self, name: &str) -> Result<(), TrackError> {
        if is_placeholder(name) {
            debug!(branch = %name, "placeholder delete bypasses tracking backend");
            return Ok(self.gateway.delete_branch(name, true).await?);
        }
        self.backend.delete_branch(name).await
    }

    /// Check out `name` in the worktree at `dir`; always routed
    pub async fn checkout(&self, dir: &Path, name: &str) -> Result<(), TrackError> {
        self.backend.checkout(dir, name).await
    }

    /// Recorded parent of `name`; placeholders never have one
    pub async fn parent(&self, name: &str) -> Result<Option<String>, TrackError> {
        if is_placeholder(name) {
            return Ok(None);
        }
        self.backend.parent(name).await
    }

    /// Stack containing `name`, trunk-most first; placeholders stand alone
    pub async fn stack(&self, name: &str) -> Result<Vec<String>, TrackError> {
        if is_placeholder(name) {
            return Ok(vec![name.to_string()]);
        }
        self.backend.stack(name).await
    }

    /// Publish `name` through the backend's submit capability
    pub async fn submit(&self, name: &str, force: bool) -> Result<(), TrackError> {
        self.backend.submit(name, force).await
    }

    /// Move `name` onto a new base
    pub async fn reparent(&self, dir: &Path, name: &str, onto: &str) -> Result<(), TrackError> {
        self.backend.reparent(dir, name, onto).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::mock::MockBackend;
    use crate::branch::{PlainBackend, placeholder_name};
    use crate::config::ForcePush;
    use tempfile::tempdir;
    use tokio::process::Command;

    async fn setup_repo(dir: &Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
            vec!["commit", "--allow-empty", "-m", "initial"],
        ] {
            let out = Command::new("git").args(&args).current_dir(dir).output().await.unwrap();
            assert!(out.status.success());
        }
    }

    #[tokio::test]
    async fn test_placeholder_create_and_delete_bypass_backend() {
        let dir = tempdir().unwrap();
        setup_repo(dir.path()).await;
        let gateway = GitGateway::open(dir.path()).await.unwrap();
        let backend = Arc::new(MockBackend::new(BackendKind::Stacked));
        let lifecycle = BranchLifecycle::new(gateway.clone(), backend.clone());

        let stub = placeholder_name(3);
        lifecycle.create(&stub, "main").await.unwrap();
        assert!(gateway.branch_exists(&stub).await.unwrap());
        lifecycle.delete(&stub).await.unwrap();
        assert!(!gateway.branch_exists(&stub).await.unwrap());

        // The backend saw neither operation
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_real_branch_create_routes_through_backend() {
        let dir = tempdir().unwrap();
        setup_repo(dir.path()).await;
        let gateway = GitGateway::open(dir.path()).await.unwrap();
        let backend = Arc::new(MockBackend::new(BackendKind::Stacked).with_gateway(gateway.clone()));
        let lifecycle = BranchLifecycle::new(gateway.clone(), backend.clone());

        lifecycle.create("P500-fix-bug-01-01-0900", "main").await.unwrap();
        assert_eq!(backend.calls(), vec!["create P500-fix-bug-01-01-0900 from main"]);
        assert!(gateway.branch_exists("P500-fix-bug-01-01-0900").await.unwrap());
    }

    #[tokio::test]
    async fn test_checkout_always_routes_through_backend() {
        let dir = tempdir().unwrap();
        setup_repo(dir.path()).await;
        let gateway = GitGateway::open(dir.path()).await.unwrap();
        let backend = Arc::new(MockBackend::new(BackendKind::Stacked).with_gateway(gateway.clone()));
        let lifecycle = BranchLifecycle::new(gateway.clone(), backend.clone());

        // Even a placeholder checkout is routed
        let stub = placeholder_name(1);
        lifecycle.create(&stub, "main").await.unwrap();
        let wt = dir.path().join("wt");
        gateway.add_worktree(&wt, &stub).await.unwrap();

        lifecycle.create("P9-touch-up-02-02-0200", "main").await.unwrap();
        lifecycle.checkout(&wt, "P9-touch-up-02-02-0200").await.unwrap();

        assert_eq!(gateway.current_branch(&wt).await.unwrap(), "P9-touch-up-02-02-0200");
        lifecycle.checkout(&wt, &stub).await.unwrap();
        assert_eq!(
            backend.calls(),
            vec![
                "create P9-touch-up-02-02-0200 from main".to_string(),
                "checkout P9-touch-up-02-02-0200".to_string(),
                format!("checkout {stub}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_reparent_moves_branch_on_plain_backend() {
        let dir = tempdir().unwrap();
        setup_repo(dir.path()).await;
        let gateway = GitGateway::open(dir.path()).await.unwrap();
        let backend = Arc::new(PlainBackend::new(gateway.clone(), ForcePush::Auto));
        let lifecycle = BranchLifecycle::new(gateway.clone(), backend);

        lifecycle.create("P5-feature-01-01-0900", "main").await.unwrap();
        let wt = dir.path().join("wt");
        gateway.add_worktree(&wt, "P5-feature-01-01-0900").await.unwrap();

        let commit = |d: std::path::PathBuf, msg: &'static str| async move {
            let out = Command::new("git")
                .args(["commit", "--allow-empty", "-m", msg])
                .current_dir(&d)
                .output()
                .await
                .unwrap();
            assert!(out.status.success());
        };
        commit(wt.clone(), "feature work").await;
        commit(dir.path().to_path_buf(), "trunk moved").await;

        lifecycle.reparent(&wt, "P5-feature-01-01-0900", "main").await.unwrap();

        // The branch now sits on top of the moved trunk
        let missing = gateway.log_subjects("P5-feature-01-01-0900", "main").await.unwrap();
        assert!(missing.is_empty(), "main should be an ancestor again, missing: {missing:?}");
        let own = gateway.log_subjects("main", "P5-feature-01-01-0900").await.unwrap();
        assert_eq!(own, vec!["feature work".to_string()]);
    }

    #[tokio::test]
    async fn test_placeholder_never_in_stack_views() {
        let dir = tempdir().unwrap();
        setup_repo(dir.path()).await;
        let gateway = GitGateway::open(dir.path()).await.unwrap();
        let backend = Arc::new(MockBackend::new(BackendKind::Stacked));
        let lifecycle = BranchLifecycle::new(gateway, backend.clone());

        let stub = placeholder_name(2);
        assert_eq!(lifecycle.parent(&stub).await.unwrap(), None);
        assert_eq!(lifecycle.stack(&stub).await.unwrap(), vec![stub]);
        assert!(backend.calls().is_empty());
    }
}
