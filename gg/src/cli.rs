//! CLI argument parsing for the gitgate query bin

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gg")]
#[command(author, version, about = "Query-side git gateway", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the detected trunk branch
    Trunk,

    /// Compare a branch with its remote counterpart
    Diverged {
        /// Branch to compare
        #[arg(required = true)]
        branch: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check whether a branch exists
    Exists {
        /// Branch name
        #[arg(required = true)]
        branch: String,

        /// Check the remote instead of local refs
        #[arg(short, long)]
        remote: bool,
    },

    /// Show the branch checked out in a worktree directory
    Head {
        /// Worktree directory (default: repo root)
        dir: Option<PathBuf>,
    },
}
