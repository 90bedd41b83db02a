//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BranchDeck - worktree slots, branch lifecycle, PR submission
#[derive(Parser)]
#[command(
    name = "bd",
    about = "Worktree slot pool, branch lifecycle, and PR submission pipeline",
    version,
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the worktree slot pool
    Pool {
        #[command(subcommand)]
        command: PoolCommand,
    },

    /// Assign and release slots
    Slot {
        #[command(subcommand)]
        command: SlotCommand,
    },

    /// Create and delete work branches
    Branch {
        #[command(subcommand)]
        command: BranchCommand,
    },

    /// Push a branch and create or update its pull request
    Submit {
        /// Branch to submit (default: the branch checked out here)
        branch: Option<String>,

        /// Override the divergence guard
        #[arg(short, long)]
        force: bool,

        /// Review submission; an existing PR for the branch is an error
        #[arg(long)]
        review: bool,

        /// Leave the PR in draft after content is finalized
        #[arg(long)]
        draft: bool,
    },

    /// Verify the invariants of a submitted pull request
    Check {
        /// PR number (default: resolved from the current branch)
        #[arg(long)]
        pr: Option<u64>,

        /// Resolve the PR from this branch instead
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Check out the head branch of a pull request
    Checkout {
        /// PR number
        pr: u64,
    },

    /// Trigger a remote workflow and print its run id
    Dispatch {
        /// Workflow file name (e.g. agent.yml)
        workflow: String,

        /// Git ref to run against (default: trunk)
        #[arg(long)]
        git_ref: Option<String>,
    },
}

/// Pool management subcommands
#[derive(Debug, Subcommand)]
pub enum PoolCommand {
    /// Create the slot worktrees and their placeholder branches
    Init {
        /// Number of slots (default: from config)
        #[arg(short, long)]
        size: Option<usize>,
    },

    /// List slots holding work (or all of them)
    List {
        /// Include placeholder-occupied slots
        #[arg(long)]
        all: bool,
    },

    /// Remove a slot's worktree and placeholder branch
    Destroy {
        /// Slot number
        slot: usize,

        /// Destroy even when the slot holds unresolved work
        #[arg(short, long)]
        force: bool,
    },
}

/// Slot assignment subcommands
#[derive(Debug, Subcommand)]
pub enum SlotCommand {
    /// Check out a work branch in a slot
    Assign {
        /// Slot number
        slot: usize,

        /// Branch to check out
        branch: String,

        /// Replace the branch the slot already holds
        #[arg(long)]
        reassign: bool,
    },

    /// Swap a slot back to its placeholder branch
    Unassign {
        /// Slot number
        slot: usize,
    },
}

/// Branch subcommands
#[derive(Debug, Subcommand)]
pub enum BranchCommand {
    /// Create a work branch following the naming convention
    New {
        /// Free-form description, slugified into the name
        #[arg(required = true)]
        description: Vec<String>,

        /// Work-item number (default: from the linkage file)
        #[arg(short, long)]
        item: Option<u64>,

        /// Parent work item this one was split out of
        #[arg(long)]
        parent_item: Option<u64>,

        /// Base branch (default: trunk)
        #[arg(short, long)]
        base: Option<String>,

        /// Assign the new branch to this slot
        #[arg(short, long)]
        slot: Option<usize>,
    },

    /// Delete a branch (and its tracking metadata, if any)
    Delete {
        /// Branch name
        name: String,
    },
}
