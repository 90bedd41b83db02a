//! Work-branch naming convention
//!
//! Implementation branches encode their work item, an optional parent work
//! item, a slugified description, and a creation stamp:
//! `P{item}-{slug}-{mm-dd-HHMM}` or `P{item}-O{parent}-{slug}-{mm-dd-HHMM}`.
//!
//! Slot placeholders (`__slot-03-stub__`) are a separate namespace and never
//! parse as work branches.

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

/// Longest branch name the convention will emit; the slug absorbs the cut
pub const MAX_BRANCH_LEN: usize = 64;

static WORK_BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^P(\d+)(?:-O(\d+))?-(.+)-(\d{2}-\d{2}-\d{4})$").unwrap());

/// A branch name that follows the work-item convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkBranch {
    /// Work-item number this branch implements
    pub item: u64,

    /// Work item this one was split out of, if any
    pub parent_item: Option<u64>,

    /// Slugified description
    pub slug: String,

    /// Creation stamp, `mm-dd-HHMM`
    pub stamp: String,
}

impl WorkBranch {
    /// Build a conforming name from a free-form description
    pub fn new(item: u64, parent_item: Option<u64>, description: &str, at: DateTime<Local>) -> Self {
        let stamp = at.format("%m-%d-%H%M").to_string();
        let prefix_len = match parent_item {
            Some(p) => format!("P{item}-O{p}-").len(),
            None => format!("P{item}-").len(),
        };
        // "-" + stamp
        let budget = MAX_BRANCH_LEN.saturating_sub(prefix_len + 1 + stamp.len());

        let mut slug = slugify(description);
        if slug.len() > budget {
            slug.truncate(budget);
            while slug.ends_with('-') {
                slug.pop();
            }
        }
        if slug.is_empty() {
            slug = "work".to_string();
        }

        Self {
            item,
            parent_item,
            slug,
            stamp,
        }
    }

    /// Parse a branch name; non-conforming names are `None`, not an error
    pub fn parse(name: &str) -> Option<Self> {
        if is_placeholder(name) {
            return None;
        }
        let caps = WORK_BRANCH_RE.captures(name)?;
        Some(Self {
            item: caps[1].parse().ok()?,
            parent_item: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            slug: caps[3].to_string(),
            stamp: caps[4].to_string(),
        })
    }

    /// Render the branch name
    pub fn name(&self) -> String {
        match self.parent_item {
            Some(p) => format!("P{}-O{}-{}-{}", self.item, p, self.slug, self.stamp),
            None => format!("P{}-{}-{}", self.item, self.slug, self.stamp),
        }
    }
}

impl std::fmt::Display for WorkBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lowercase, alphanumeric, hyphen-separated
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_hyphen = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Deterministic placeholder branch name for a slot
///
/// One placeholder per slot: a single branch cannot be checked out in two
/// worktrees at once.
pub fn placeholder_name(slot: usize) -> String {
    format!("__slot-{slot:02}-stub__")
}

/// Is this a slot placeholder branch?
pub fn is_placeholder(name: &str) -> bool {
    name.starts_with("__slot-") && name.ends_with("-stub__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_round_trip_without_parent() {
        let wb = WorkBranch::new(500, None, "Fix bug", at());
        assert_eq!(wb.name(), "P500-fix-bug-01-01-0900");
        assert_eq!(WorkBranch::parse(&wb.name()), Some(wb));
    }

    #[test]
    fn test_round_trip_with_parent() {
        let wb = WorkBranch::new(512, Some(500), "split out the parser", at());
        assert_eq!(wb.name(), "P512-O500-split-out-the-parser-01-01-0900");
        let parsed = WorkBranch::parse(&wb.name()).unwrap();
        assert_eq!(parsed.item, 512);
        assert_eq!(parsed.parent_item, Some(500));
        assert_eq!(parsed.slug, "split-out-the-parser");
    }

    #[test]
    fn test_long_description_fits_budget() {
        let desc = "a very long description that keeps going and going and going well past any sane branch length";
        let wb = WorkBranch::new(7, None, desc, at());
        assert!(wb.name().len() <= MAX_BRANCH_LEN);
        assert!(!wb.slug.ends_with('-'));
        assert_eq!(WorkBranch::parse(&wb.name()).unwrap().item, 7);
    }

    #[test]
    fn test_non_conforming_names_are_none() {
        assert_eq!(WorkBranch::parse("main"), None);
        assert_eq!(WorkBranch::parse("feature/login"), None);
        assert_eq!(WorkBranch::parse("P500-missing-stamp"), None);
        assert_eq!(WorkBranch::parse("__slot-03-stub__"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fix the Bug!"), "fix-the-bug");
        assert_eq!(slugify("  spaces   everywhere "), "spaces-everywhere");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn test_placeholder_names_unique_per_slot() {
        let names: Vec<String> = (1..=16).map(placeholder_name).collect();
        for (i, a) in names.iter().enumerate() {
            assert!(is_placeholder(a));
            for b in names.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_placeholder_recognition() {
        assert!(is_placeholder("__slot-03-stub__"));
        assert!(!is_placeholder("P500-fix-bug-01-01-0900"));
        assert!(!is_placeholder("slot-03"));
    }
}
