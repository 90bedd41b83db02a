//! PR invariant validation
//!
//! Read-only verification of what the submission pipeline is supposed to
//! establish. Three independent checks, independently reported:
//!
//! 1. the footer references exactly the PR's own number
//! 2. the body carries a closing reference to the linked work item
//! 3. the work item encoded in the branch name agrees with the linkage file
//!
//! Number matching is boundary-safe throughout: a footer referencing PR
//! #123 must not satisfy a check for PR #12.

use std::sync::LazyLock;

use regex::Regex;

use crate::branch::WorkBranch;
use crate::github::PrDetails;
use crate::workitem::WorkItemLink;

static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"bd checkout (\d+)").unwrap());

static CLOSES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:closes|fixes|resolves)\s+(?:([A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+))?#(\d+)").unwrap()
});

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Pass,
    Fail(String),
    /// Inputs for this check are absent; not a failure
    Skipped(String),
}

impl CheckResult {
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }
}

/// The three independent verdicts
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub footer: CheckResult,
    pub closes: CheckResult,
    pub linkage: CheckResult,
}

impl CheckReport {
    /// Evaluate every check against a PR and the optional work-item linkage
    pub fn evaluate(pr: &PrDetails, link: Option<&WorkItemLink>) -> Self {
        let body = pr.body.as_deref().unwrap_or("");
        Self {
            footer: check_footer(body, pr.number),
            closes: match link {
                Some(l) => check_closing_reference(body, l.issue_number, l.plans_repo.as_deref()),
                None => CheckResult::Skipped("no work-item linkage file".to_string()),
            },
            linkage: match link {
                Some(l) => check_branch_linkage(&pr.head, l.issue_number),
                None => CheckResult::Skipped("no work-item linkage file".to_string()),
            },
        }
    }

    pub fn passed(&self) -> bool {
        !self.footer.is_fail() && !self.closes.is_fail() && !self.linkage.is_fail()
    }
}

/// Check (a): footer contains the exact PR number
pub fn check_footer(body: &str, pr_number: u64) -> CheckResult {
    let expected = pr_number.to_string();
    let mut seen = None;

    for caps in FOOTER_RE.captures_iter(body) {
        // The capture swallows the whole digit run, so #123 can never
        // satisfy #12
        if caps[1] == expected {
            return CheckResult::Pass;
        }
        seen = Some(caps[1].to_string());
    }

    match seen {
        Some(other) => CheckResult::Fail(format!("footer references PR #{other}, expected #{expected}")),
        None => CheckResult::Fail("no submission footer found".to_string()),
    }
}

/// True when `body` closes exactly `issue_number`
///
/// An unqualified `#N` always counts; a qualified `owner/repo#N` counts only
/// when it names the linked plans repository.
pub fn has_closing_reference(body: &str, issue_number: u64, plans_repo: Option<&str>) -> bool {
    let expected = issue_number.to_string();

    for caps in CLOSES_RE.captures_iter(body) {
        if caps[2] != expected {
            continue;
        }
        match (caps.get(1), plans_repo) {
            (None, _) => return true,
            (Some(repo), Some(wanted)) if repo.as_str().eq_ignore_ascii_case(wanted) => return true,
            _ => {}
        }
    }
    false
}

/// Check (b): case-insensitive closing reference to the linked work item
pub fn check_closing_reference(body: &str, issue_number: u64, plans_repo: Option<&str>) -> CheckResult {
    if has_closing_reference(body, issue_number, plans_repo) {
        CheckResult::Pass
    } else {
        CheckResult::Fail(format!("body has no closing reference to work item #{issue_number}"))
    }
}

/// Check (c): the item number in the branch name matches the linkage file
pub fn check_branch_linkage(branch: &str, issue_number: u64) -> CheckResult {
    match WorkBranch::parse(branch) {
        Some(wb) if wb.item == issue_number => CheckResult::Pass,
        Some(wb) => CheckResult::Fail(format!(
            "branch encodes work item #{}, linkage file says #{issue_number}",
            wb.item
        )),
        None => CheckResult::Skipped("branch name does not encode a work item".to_string()),
    }
}
