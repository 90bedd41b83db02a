//! Work-item linkage file
//!
//! `.branchdeck/work-item.json` ties a checkout to the work item it
//! implements: `{"issue_number": 500, "plans_repo": "acme/plans"}`.
//! `plans_repo` qualifies the closing reference when the work item lives in
//! a different repository than the code.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Relative path of the linkage file inside a checkout
pub const LINK_FILE: &str = ".branchdeck/work-item.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemLink {
    /// Work-item (issue) number
    pub issue_number: u64,

    /// `owner/repo` holding the work item, when not this repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plans_repo: Option<String>,
}

impl WorkItemLink {
    /// The closing reference the PR body must carry
    pub fn closing_reference(&self) -> String {
        match &self.plans_repo {
            Some(repo) => format!("Closes {repo}#{}", self.issue_number),
            None => format!("Closes #{}", self.issue_number),
        }
    }

    fn path(checkout: &Path) -> PathBuf {
        checkout.join(LINK_FILE)
    }

    /// Load the linkage from a checkout; absence is a value, not an error
    pub fn load(checkout: &Path) -> Result<Option<Self>> {
        let path = Self::path(checkout);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let link = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(link))
    }

    /// Write the linkage into a checkout
    pub fn save(&self, checkout: &Path) -> Result<()> {
        let path = Self::path(checkout);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let link = WorkItemLink {
            issue_number: 500,
            plans_repo: Some("acme/plans".to_string()),
        };
        link.save(dir.path()).unwrap();
        assert_eq!(WorkItemLink::load(dir.path()).unwrap(), Some(link));
    }

    #[test]
    fn test_absent_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(WorkItemLink::load(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_closing_reference_qualification() {
        let plain = WorkItemLink {
            issue_number: 7,
            plans_repo: None,
        };
        assert_eq!(plain.closing_reference(), "Closes #7");

        let qualified = WorkItemLink {
            issue_number: 7,
            plans_repo: Some("acme/plans".to_string()),
        };
        assert_eq!(qualified.closing_reference(), "Closes acme/plans#7");
    }
}
