//! GitGate - thin async capability layer over git
//!
//! Wraps the `git` CLI with typed operations for branches, worktrees, diffs,
//! and remote-tip comparison. Knows nothing about pull requests, slots, or
//! stacked branches - callers layer policy on top.
//!
//! Every subprocess runs with `GIT_TERMINAL_PROMPT=0`; a command that would
//! block on a credential or merge prompt fails instead of hanging.
//!
//! # Example
//!
//! ```ignore
//! use gitgate::{GitGateway, RemoteStatus};
//!
//! let gate = GitGateway::open(".").await?;
//! let trunk = gate.trunk_branch().await?;
//! match gate.divergence("feature-x").await? {
//!     RemoteStatus::NotOnRemote => println!("never pushed"),
//!     RemoteStatus::Compared(d) => println!("ahead {} behind {}", d.ahead, d.behind),
//! }
//! ```

pub mod cli;
pub mod config;
mod divergence;
mod error;
mod gateway;

pub use divergence::{Divergence, RemoteStatus};
pub use error::GitError;
pub use gateway::{GitGateway, PushMode};
