//! Description synthesis seam
//!
//! Natural-language PR descriptions come from an external collaborator (in
//! production, a language model fed the filtered diff). This module only
//! owns the trait and a deterministic commit-log fallback so the pipeline
//! works without any provider configured.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DescribeError {
    #[error("description provider failed: {0}")]
    Provider(String),
}

/// Turns a branch's changes into a PR description body
#[async_trait]
pub trait Describe: Send + Sync {
    /// `subjects` are commit subjects newest-first; `diff` is already
    /// filtered and truncated
    async fn describe(&self, branch: &str, subjects: &[String], diff: &str) -> Result<String, DescribeError>;
}

/// Fallback provider: a summary built from the commit log
pub struct CommitLogDescribe;

#[async_trait]
impl Describe for CommitLogDescribe {
    async fn describe(&self, branch: &str, subjects: &[String], diff: &str) -> Result<String, DescribeError> {
        let mut body = String::new();

        if subjects.is_empty() {
            body.push_str(&format!("Changes on `{branch}`.\n"));
        } else {
            body.push_str("## Changes\n\n");
            for subject in subjects.iter().rev() {
                body.push_str(&format!("- {subject}\n"));
            }
        }

        let files = diff
            .lines()
            .filter(|l| l.starts_with("diff --git "))
            .count();
        if files > 0 {
            body.push_str(&format!("\n{files} file(s) touched.\n"));
        }

        Ok(body)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Returns a canned description, recording nothing
    pub struct MockDescribe {
        pub canned: String,
    }

    impl MockDescribe {
        pub fn new(canned: &str) -> Self {
            Self {
                canned: canned.to_string(),
            }
        }
    }

    #[async_trait]
    impl Describe for MockDescribe {
        async fn describe(&self, _branch: &str, _subjects: &[String], _diff: &str) -> Result<String, DescribeError> {
            Ok(self.canned.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_log_fallback_lists_subjects_oldest_first() {
        let subjects = vec!["second change".to_string(), "first change".to_string()];
        let body = CommitLogDescribe
            .describe("P1-x-01-01-0900", &subjects, "")
            .await
            .unwrap();
        let first = body.find("first change").unwrap();
        let second = body.find("second change").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_commit_log_fallback_handles_empty_log() {
        let body = CommitLogDescribe.describe("b", &[], "").await.unwrap();
        assert!(body.contains("`b`"));
    }
}
