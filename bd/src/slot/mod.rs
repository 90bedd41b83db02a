//! Worktree slot pool
//!
//! A fixed set of reusable worktrees. Every slot holds exactly one checked
//! out branch at every instant: a real work branch when assigned, its own
//! placeholder branch when empty. Slot state is derived from git itself
//! (the branch checked out in the slot's worktree), never from a shadow
//! state file.

use std::path::PathBuf;
use std::sync::Arc;

use gitgate::GitError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::branch::{BranchLifecycle, TrackError, is_placeholder, placeholder_name};

/// Slot operation failures, each carrying its remedy
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("slot {0} is out of range for a pool of {1}")]
    OutOfRange(usize, usize),

    #[error("slot {slot} already holds '{branch}'; pass --reassign to replace it")]
    AlreadyAssigned { slot: usize, branch: String },

    #[error("slot {slot} holds unresolved work on '{branch}'; pass --force to destroy it anyway")]
    Occupied { slot: usize, branch: String },

    #[error("slot {0} has no worktree; run `bd pool init` first")]
    NotInitialized(usize),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("could not create pool directory: {0}")]
    Io(#[from] std::io::Error),
}

/// What a slot currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// Holding its placeholder branch
    Empty,
    /// Holding a real work branch
    Assigned { branch: String },
}

/// One row of `list`
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub id: usize,
    pub path: PathBuf,
    pub state: SlotState,
}

/// Fixed-capacity pool of worktree slots
///
/// Operations on one slot are serialized through that slot's mutex; slots
/// are independent and may be operated on concurrently.
pub struct SlotPool {
    pool_dir: PathBuf,
    size: usize,
    lifecycle: Arc<BranchLifecycle>,
    locks: Vec<Mutex<()>>,
}

impl SlotPool {
    pub fn new(pool_dir: impl Into<PathBuf>, size: usize, lifecycle: Arc<BranchLifecycle>) -> Self {
        Self {
            pool_dir: pool_dir.into(),
            size,
            lifecycle,
            locks: (0..size).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Worktree directory for a slot
    pub fn slot_dir(&self, slot: usize) -> PathBuf {
        self.pool_dir.join(format!("slot-{slot:02}"))
    }

    fn check_range(&self, slot: usize) -> Result<(), SlotError> {
        if slot == 0 || slot > self.size {
            return Err(SlotError::OutOfRange(slot, self.size));
        }
        Ok(())
    }

    /// Create every slot: placeholder branch (create-if-absent) + worktree
    ///
    /// Idempotent; slots that already exist are left as they are.
    pub async fn init(&self) -> Result<(), SlotError> {
        tokio::fs::create_dir_all(&self.pool_dir).await?;

        for slot in 1..=self.size {
            let _guard = self.locks[slot - 1].lock().await;
            let dir = self.slot_dir(slot);
            if dir.exists() {
                debug!(slot, "slot already initialized");
                continue;
            }

            let stub = self.ensure_placeholder(slot).await?;
            self.lifecycle.gateway().add_worktree(&dir, &stub).await?;
            info!(slot, dir = %dir.display(), branch = %stub, "initialized slot");
        }

        Ok(())
    }

    /// Check out a work branch in the slot's worktree
    pub async fn assign(&self, slot: usize, branch: &str, reassign: bool) -> Result<(), SlotError> {
        self.check_range(slot)?;
        let _guard = self.locks[slot - 1].lock().await;

        let state = self.state_locked(slot).await?;
        if let SlotState::Assigned { branch: held } = state {
            if !reassign {
                return Err(SlotError::AlreadyAssigned { slot, branch: held });
            }
            warn!(slot, held = %held, next = %branch, "reassigning occupied slot");
        }

        let dir = self.slot_dir(slot);
        self.lifecycle.checkout(&dir, branch).await?;
        info!(slot, branch = %branch, "assigned slot");
        Ok(())
    }

    /// Swap the slot back to its placeholder branch
    ///
    /// The previously assigned branch is left untouched for the lander to
    /// clean up. Returns the released branch, if the slot held one.
    pub async fn unassign(&self, slot: usize) -> Result<Option<String>, SlotError> {
        self.check_range(slot)?;
        let _guard = self.locks[slot - 1].lock().await;

        let dir = self.slot_dir(slot);
        let previous = match self.state_locked(slot).await? {
            SlotState::Empty => {
                debug!(slot, "slot already empty");
                return Ok(None);
            }
            SlotState::Assigned { branch } => branch,
        };

        let stub = self.ensure_placeholder(slot).await?;
        self.lifecycle.checkout(&dir, &stub).await?;
        info!(slot, released = %previous, "unassigned slot");
        Ok(Some(previous))
    }

    /// Remove the slot's worktree and delete its placeholder branch
    pub async fn destroy(&self, slot: usize, force: bool) -> Result<(), SlotError> {
        self.check_range(slot)?;
        let _guard = self.locks[slot - 1].lock().await;

        if let SlotState::Assigned { branch } = self.state_locked(slot).await?
            && !force
        {
            return Err(SlotError::Occupied { slot, branch });
        }

        let dir = self.slot_dir(slot);
        self.lifecycle.gateway().remove_worktree(&dir, true).await?;
        // Only now can the placeholder go; it was checked out until here
        self.lifecycle.delete(&placeholder_name(slot)).await?;
        info!(slot, "destroyed slot");
        Ok(())
    }

    /// Current state of a slot
    pub async fn state(&self, slot: usize) -> Result<SlotState, SlotError> {
        self.check_range(slot)?;
        let _guard = self.locks[slot - 1].lock().await;
        self.state_locked(slot).await
    }

    /// All initialized slots; placeholder-occupied ones filtered by default
    pub async fn list(&self, include_empty: bool) -> Result<Vec<SlotInfo>, SlotError> {
        let mut slots = Vec::new();
        for slot in 1..=self.size {
            let dir = self.slot_dir(slot);
            if !dir.exists() {
                continue;
            }
            let _guard = self.locks[slot - 1].lock().await;
            let state = self.state_locked(slot).await?;
            if matches!(state, SlotState::Empty) && !include_empty {
                continue;
            }
            slots.push(SlotInfo {
                id: slot,
                path: dir,
                state,
            });
        }
        Ok(slots)
    }

    async fn state_locked(&self, slot: usize) -> Result<SlotState, SlotError> {
        let dir = self.slot_dir(slot);
        if !dir.exists() {
            return Err(SlotError::NotInitialized(slot));
        }
        let head = self.lifecycle.gateway().current_branch(&dir).await?;
        if is_placeholder(&head) {
            Ok(SlotState::Empty)
        } else {
            Ok(SlotState::Assigned { branch: head })
        }
    }

    /// Create the slot's placeholder branch if it does not already exist
    ///
    /// Placeholders bypass the tracking backend by construction (the
    /// lifecycle manager enforces it); calling this twice is not an error.
    async fn ensure_placeholder(&self, slot: usize) -> Result<String, SlotError> {
        let stub = placeholder_name(slot);
        if !self.lifecycle.gateway().branch_exists(&stub).await? {
            let trunk = self.lifecycle.gateway().trunk_branch().await?;
            match self.lifecycle.create(&stub, &trunk).await {
                Ok(()) => debug!(branch = %stub, "created placeholder"),
                // Lost a race with ourselves; the branch is there, move on
                Err(TrackError::Git(GitError::BranchExists(_))) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(stub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::mock::MockBackend;
    use crate::branch::{BackendKind, PlainBackend};
    use crate::config::ForcePush;
    use gitgate::GitGateway;
    use std::path::Path;
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

    async fn make_pool(repo: &Path, pool_dir: &Path, size: usize) -> SlotPool {
        let gateway = GitGateway::open(repo).await.unwrap();
        let backend = Arc::new(PlainBackend::new(gateway.clone(), ForcePush::Auto));
        let lifecycle = Arc::new(BranchLifecycle::new(gateway, backend));
        SlotPool::new(pool_dir, size, lifecycle)
    }

    #[tokio::test]
    async fn test_init_creates_placeholders_and_worktrees() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 3).await;

        pool.init().await.unwrap();

        for slot in 1..=3 {
            let state = pool.state(slot).await.unwrap();
            assert_eq!(state, SlotState::Empty, "slot {slot} should hold its placeholder");
            assert!(pool.slot_dir(slot).exists());
        }

        // Idempotent
        pool.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_assign_and_reject_double_assign() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 2).await;
        pool.init().await.unwrap();

        let gateway = GitGateway::open(repo.path()).await.unwrap();
        gateway.create_branch("P200-do-work-01-01-0900", "main", false).await.unwrap();
        gateway.create_branch("P201-other-01-01-0910", "main", false).await.unwrap();

        pool.assign(1, "P200-do-work-01-01-0900", false).await.unwrap();
        assert_eq!(
            pool.state(1).await.unwrap(),
            SlotState::Assigned {
                branch: "P200-do-work-01-01-0900".to_string()
            }
        );

        // Occupied without --reassign
        let err = pool.assign(1, "P201-other-01-01-0910", false).await.unwrap_err();
        assert!(matches!(err, SlotError::AlreadyAssigned { slot: 1, .. }));

        // Allowed with it
        pool.assign(1, "P201-other-01-01-0910", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_unassign_restores_placeholder_and_keeps_branch() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 3).await;
        pool.init().await.unwrap();

        let gateway = GitGateway::open(repo.path()).await.unwrap();
        gateway.create_branch("P200-do-work-01-01-0900", "main", false).await.unwrap();
        pool.assign(3, "P200-do-work-01-01-0900", false).await.unwrap();

        let released = pool.unassign(3).await.unwrap();
        assert_eq!(released.as_deref(), Some("P200-do-work-01-01-0900"));

        // The worktree is back on the slot's own placeholder
        let head = gateway.current_branch(&pool.slot_dir(3)).await.unwrap();
        assert_eq!(head, placeholder_name(3));

        // The released branch still exists; cleanup is the lander's job
        assert!(gateway.branch_exists("P200-do-work-01-01-0900").await.unwrap());

        // Unassigning an empty slot is a no-op
        assert_eq!(pool.unassign(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_filters_placeholder_slots() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 2).await;
        pool.init().await.unwrap();

        let gateway = GitGateway::open(repo.path()).await.unwrap();
        gateway.create_branch("P7-small-fix-01-01-0900", "main", false).await.unwrap();
        pool.assign(2, "P7-small-fix-01-01-0900", false).await.unwrap();

        let busy = pool.list(false).await.unwrap();
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].id, 2);

        let all = pool.list(true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_destroy_rejects_occupied_unless_forced() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 1).await;
        pool.init().await.unwrap();

        let gateway = GitGateway::open(repo.path()).await.unwrap();
        gateway.create_branch("P9-risky-01-01-0900", "main", false).await.unwrap();
        pool.assign(1, "P9-risky-01-01-0900", false).await.unwrap();

        let err = pool.destroy(1, false).await.unwrap_err();
        assert!(matches!(err, SlotError::Occupied { slot: 1, .. }));

        pool.destroy(1, true).await.unwrap();
        assert!(!pool.slot_dir(1).exists());
        assert!(!gateway.branch_exists(&placeholder_name(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_out_of_range() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 2).await;

        assert!(matches!(pool.assign(0, "x", false).await.unwrap_err(), SlotError::OutOfRange(0, 2)));
        assert!(matches!(pool.unassign(5).await.unwrap_err(), SlotError::OutOfRange(5, 2)));
    }

    #[tokio::test]
    async fn test_placeholder_ensure_idempotent_via_reinit() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;
        let pool = make_pool(repo.path(), pool_dir.path(), 1).await;

        pool.init().await.unwrap();
        let gateway = GitGateway::open(repo.path()).await.unwrap();

        // Drop the worktree behind the pool's back, keep the branch, re-init
        gateway.remove_worktree(&pool.slot_dir(1), true).await.unwrap();
        pool.init().await.unwrap();

        assert_eq!(pool.state(1).await.unwrap(), SlotState::Empty);
    }

    #[tokio::test]
    async fn test_placeholder_checkout_routes_through_backend() {
        let repo = tempdir().unwrap();
        let pool_dir = tempdir().unwrap();
        setup_repo(repo.path()).await;

        let gateway = GitGateway::open(repo.path()).await.unwrap();
        let backend = Arc::new(MockBackend::new(BackendKind::Stacked).with_gateway(gateway.clone()));
        let lifecycle = Arc::new(BranchLifecycle::new(gateway.clone(), backend.clone()));
        let pool = SlotPool::new(pool_dir.path(), 1, lifecycle);
        pool.init().await.unwrap();

        gateway.create_branch("P3-wire-up-01-01-0900", "main", false).await.unwrap();
        pool.assign(1, "P3-wire-up-01-01-0900", false).await.unwrap();
        pool.unassign(1).await.unwrap();

        // Checkouts (real branch and placeholder) went through the backend;
        // placeholder creation did not
        let calls = backend.calls();
        assert!(calls.contains(&"checkout P3-wire-up-01-01-0900".to_string()));
        assert!(calls.contains(&format!("checkout {}", placeholder_name(1))));
        assert!(!calls.iter().any(|c| c.starts_with("create __slot-")));
    }
}
