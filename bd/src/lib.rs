//! BranchDeck - worktree slots, branch lifecycle, PR submission
//!
//! BranchDeck manages the branch-based unit-of-work lifecycle for an
//! automated development loop: a fixed pool of reusable worktree slots, a
//! branch lifecycle that spans a plain git backend and a stack-tracking
//! backend, and a multi-phase pull-request submission pipeline with a
//! read-only validator for the invariants the pipeline establishes.
//!
//! # Core Concepts
//!
//! - **Slots**: every worktree always has exactly one branch checked out;
//!   empty slots hold a disposable per-slot placeholder branch
//! - **One lifecycle, two backends**: checkout always routes through the
//!   selected backend; placeholder create/delete always bypass it
//! - **Divergence as a guard**: the remote is re-checked immediately before
//!   every push-equivalent step; policy lives in the callers, not the check
//! - **Values over exceptions**: no-PR-yet and not-on-remote are enum values,
//!   guard violations are typed errors carrying their remedy
//!
//! # Modules
//!
//! - [`branch`] - naming convention, tracking backends, lifecycle manager
//! - [`slot`] - fixed-capacity worktree slot pool
//! - [`submit`] - the PR submission pipeline
//! - [`github`] - `gh`-backed hosting client behind the [`PrHost`] trait
//! - [`check`] - read-only PR invariant validation
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod branch;
pub mod check;
pub mod cli;
pub mod config;
pub mod github;
pub mod slot;
pub mod submit;
pub mod workitem;

// Re-export commonly used types
pub use branch::{
    BackendKind, BranchLifecycle, PlainBackend, StackedBackend, TrackError, TrackingBackend, WorkBranch,
    create_backend, is_placeholder, placeholder_name,
};
pub use check::{CheckReport, CheckResult, check_branch_linkage, check_closing_reference, check_footer};
pub use config::{Config, ForcePush, PoolConfig, SubmitConfig, TrackingMode};
pub use github::{GhClient, GhError, PrDetails, PrHost, PrLookup};
pub use slot::{SlotError, SlotInfo, SlotPool, SlotState};
pub use submit::{
    Describe, DescribeError, DiffPolicy, SubmitError, SubmitPipeline, SubmitReceipt, SubmitRequest, filter_diff,
};
pub use workitem::WorkItemLink;
