//! Hosting-platform client over the `gh` CLI
//!
//! Reads go through `gh api` (the raw REST surface preserves quota better
//! than the high-level `pr` subcommands); PR creation uses `gh pr create`
//! because only it owns the full create flow. Everything runs with prompts
//! disabled via `GH_PROMPT_DISABLED`.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

/// Failures from the hosting client
#[derive(Debug, thiserror::Error)]
pub enum GhError {
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("could not parse {what} from gh output: {output:?}")]
    Unparsable { what: String, output: String },

    #[error("failed to spawn gh: {0}")]
    Spawn(String),
}

/// Fields of a pull request this system cares about
#[derive(Debug, Clone, Deserialize)]
pub struct PrDetails {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(rename = "base", deserialize_with = "deref_ref")]
    pub base: String,
    #[serde(rename = "head", deserialize_with = "deref_ref")]
    pub head: String,
}

fn deref_ref<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Ref {
        r#ref: String,
    }
    Ok(Ref::deserialize(deserializer)?.r#ref)
}

/// Existence is normal control flow for callers, so it is a value
#[derive(Debug, Clone)]
pub enum PrLookup {
    Found(PrDetails),
    NotFound,
}

/// The slice of the hosting platform the pipeline and validator consume
#[async_trait]
pub trait PrHost: Send + Sync {
    /// Open PR whose head is `branch`, if any
    async fn find_pr_by_branch(&self, branch: &str) -> Result<PrLookup, GhError>;

    /// PR by number
    async fn get_pr(&self, number: u64) -> Result<PrLookup, GhError>;

    /// Create a PR, returning its number
    async fn create_pr(&self, head: &str, base: &str, title: &str, body: &str, draft: bool) -> Result<u64, GhError>;

    /// Replace the PR body
    async fn update_body(&self, number: u64, body: &str) -> Result<(), GhError>;

    /// Flip a draft PR to ready-for-review
    async fn mark_ready(&self, number: u64) -> Result<(), GhError>;
}

/// `gh`-backed implementation
pub struct GhClient {
    repo_root: PathBuf,
}

impl GhClient {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn gh(&self, args: &[&str]) -> Result<Output, GhError> {
        debug!(?args, "running gh");
        Command::new("gh")
            .args(args)
            .current_dir(&self.repo_root)
            .env("GH_PROMPT_DISABLED", "1")
            .output()
            .await
            .map_err(|e| GhError::Spawn(e.to_string()))
    }

    async fn run(&self, args: &[&str]) -> Result<String, GhError> {
        let out = self.gh(args).await?;
        if !out.status.success() {
            return Err(GhError::CommandFailed {
                command: format!("gh {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn parse_details(&self, raw: &str) -> Result<PrLookup, GhError> {
        if raw.is_empty() || raw == "null" {
            return Ok(PrLookup::NotFound);
        }
        let details: PrDetails = serde_json::from_str(raw).map_err(|e| GhError::Unparsable {
            what: format!("pull request details ({e})"),
            output: raw.to_string(),
        })?;
        Ok(PrLookup::Found(details))
    }

    /// Trigger a workflow and return a run id for later correlation
    pub async fn dispatch_workflow(&self, workflow: &str, git_ref: &str) -> Result<u64, GhError> {
        self.run(&["workflow", "run", workflow, "--ref", git_ref]).await?;

        // The dispatch endpoint returns nothing; the newest run of this
        // workflow is the one we just queued
        let endpoint = format!("repos/{{owner}}/{{repo}}/actions/workflows/{workflow}/runs");
        let raw = self
            .run(&["api", &endpoint, "--jq", ".workflow_runs[0].id"])
            .await?;
        raw.parse().map_err(|_| GhError::Unparsable {
            what: "workflow run id".to_string(),
            output: raw,
        })
    }
}

#[async_trait]
impl PrHost for GhClient {
    async fn find_pr_by_branch(&self, branch: &str) -> Result<PrLookup, GhError> {
        let jq = format!(r#"[.[] | select(.head.ref == "{branch}")][0]"#);
        let raw = self
            .run(&["api", "repos/{owner}/{repo}/pulls", "--jq", &jq])
            .await?;
        self.parse_details(&raw)
    }

    async fn get_pr(&self, number: u64) -> Result<PrLookup, GhError> {
        let endpoint = format!("repos/{{owner}}/{{repo}}/pulls/{number}");
        match self.run(&["api", &endpoint]).await {
            Ok(raw) => self.parse_details(&raw),
            Err(GhError::CommandFailed { stderr, .. }) if stderr.contains("404") => Ok(PrLookup::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn create_pr(&self, head: &str, base: &str, title: &str, body: &str, draft: bool) -> Result<u64, GhError> {
        let mut args = vec![
            "pr", "create", "--head", head, "--base", base, "--title", title, "--body", body,
        ];
        if draft {
            args.push("--draft");
        }

        // gh prints the new PR's URL on stdout
        let url = self.run(&args).await?;
        let number = url
            .rsplit('/')
            .next()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| GhError::Unparsable {
                what: "pull request number".to_string(),
                output: url.clone(),
            })?;

        info!(number, head = %head, base = %base, draft, "created pull request");
        Ok(number)
    }

    async fn update_body(&self, number: u64, body: &str) -> Result<(), GhError> {
        let endpoint = format!("repos/{{owner}}/{{repo}}/pulls/{number}");
        self.run(&["api", "-X", "PATCH", &endpoint, "-f", &format!("body={body}")]).await?;
        debug!(number, "updated pull request body");
        Ok(())
    }

    async fn mark_ready(&self, number: u64) -> Result<(), GhError> {
        let number_str = number.to_string();
        self.run(&["pr", "ready", &number_str]).await?;
        info!(number, "marked pull request ready for review");
        Ok(())
    }
}
