//! Local/remote tip comparison types
//!
//! Policy-free by design: the gateway reports counts, callers decide what
//! `behind > 0` means for them (auto-rebase, hard stop, or ignore).

use serde::Serialize;

/// Ahead/behind counts for a local branch against its remote counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// Commits on the local tip that the remote lacks
    pub ahead: u64,

    /// Commits on the remote tip that the local branch lacks
    pub behind: u64,
}

impl Divergence {
    /// Local and remote tips point at the same commit
    pub fn is_identical(&self) -> bool {
        self.ahead == 0 && self.behind == 0
    }

    /// The remote has commits this branch is missing
    pub fn is_behind(&self) -> bool {
        self.behind > 0
    }
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ahead {}, behind {}", self.ahead, self.behind)
    }
}

/// Result of comparing a branch against its remote counterpart
///
/// Absence of a remote branch is an expected state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RemoteStatus {
    /// The branch has never been pushed; nothing to compare
    NotOnRemote,
    /// Both tips exist; counts attached
    Compared(Divergence),
}

impl RemoteStatus {
    /// Counts when both tips exist
    pub fn divergence(&self) -> Option<Divergence> {
        match self {
            Self::NotOnRemote => None,
            Self::Compared(d) => Some(*d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_iff_both_counts_zero() {
        assert!(Divergence { ahead: 0, behind: 0 }.is_identical());
        assert!(!Divergence { ahead: 1, behind: 0 }.is_identical());
        assert!(!Divergence { ahead: 0, behind: 1 }.is_identical());
        assert!(!Divergence { ahead: 2, behind: 3 }.is_identical());
    }

    #[test]
    fn test_behind_flag() {
        assert!(!Divergence { ahead: 5, behind: 0 }.is_behind());
        assert!(Divergence { ahead: 0, behind: 1 }.is_behind());
    }

    #[test]
    fn test_remote_status_accessor() {
        assert_eq!(RemoteStatus::NotOnRemote.divergence(), None);
        let d = Divergence { ahead: 2, behind: 1 };
        assert_eq!(RemoteStatus::Compared(d).divergence(), Some(d));
    }
}
