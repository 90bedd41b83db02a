//! PR submission pipeline
//!
//! A state machine over ordered phases: resolve existing PR, divergence
//! guard, stacked-parent guard, publish, create-or-update, describe, footer,
//! draft-to-ready. Any phase failure short-circuits; guard violations are
//! typed errors carrying the remedy, never silently retried.
//!
//! The divergence check runs immediately before the push so the answer
//! reflects the remote as of now; that is the whole defense against CI or a
//! second operator moving the tip between invocations.

use std::path::PathBuf;
use std::sync::Arc;

use gitgate::{GitError, RemoteStatus};
use tracing::{debug, info, warn};

use crate::branch::{BackendKind, BranchLifecycle, TrackError, WorkBranch};
use crate::check::has_closing_reference;
use crate::github::{GhError, PrHost, PrLookup};
use crate::workitem::WorkItemLink;

use super::describe::{Describe, DescribeError};
use super::diff::{DiffPolicy, filter_diff};
use super::footer::{github_footer, plain_footer, strip_footer};

/// Submission failures; each terminal error names its remedy
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(
        "remote has moved: '{branch}' is behind origin by {behind} commit(s) (ahead {ahead}); \
         rebase onto origin/{branch} or rerun with --force"
    )]
    RemoteDiverged { branch: String, ahead: u64, behind: u64 },

    #[error("a pull request for '{branch}' already exists (#{number}); this submission type requires a fresh branch")]
    PrAlreadyExists { branch: String, number: u64 },

    #[error(
        "stacked parent '{parent}' has no pull request of its own; creating this one would silently target trunk. \
         Submit the parent first: bd submit {parent}"
    )]
    StackedParentMissingPr { parent: String },

    #[error("push failed: {stderr}")]
    PushFailed { stderr: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Gh(#[from] GhError),

    #[error(transparent)]
    Describe(#[from] DescribeError),
}

/// What a caller asks the pipeline to do
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Branch to submit
    pub branch: String,

    /// Worktree where `branch` is checked out (for the plain auto-rebase)
    pub workdir: PathBuf,

    /// Explicit divergence override
    pub force: bool,

    /// Set by callers that created the branch from trunk in this same run;
    /// there is no remote history worth preserving, so force applies
    pub freshly_created: bool,

    /// Creation must be exclusive (review PRs); an existing PR is an error
    pub exclusive: bool,

    /// Leave the PR in draft even after content is finalized
    pub keep_draft: bool,

    /// Work-item linkage for the closing reference
    pub link: Option<WorkItemLink>,
}

impl SubmitRequest {
    pub fn new(branch: &str, workdir: impl Into<PathBuf>) -> Self {
        Self {
            branch: branch.to_string(),
            workdir: workdir.into(),
            force: false,
            freshly_created: false,
            exclusive: false,
            keep_draft: false,
            link: None,
        }
    }
}

/// Forward-only accumulator threaded through the phases
///
/// No phase may be retried without re-deriving its inputs; nothing here is
/// ever unset once written.
#[derive(Debug, Default)]
struct SubmitState {
    existing: Option<u64>,
    existing_body: Option<String>,
    existing_draft: bool,
    forced: bool,
    base: Option<String>,
    diff: Option<String>,
    description: Option<String>,
    pr: Option<u64>,
    created: bool,
}

/// Stable result surface for any caller (CLI, remote-dispatch handler)
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// The PR this submission landed on
    pub pr: u64,

    /// Created this run (vs updated in place)
    pub created: bool,

    /// Left ready-for-review
    pub ready: bool,

    /// Markup-free body copy for the commit-message trail
    pub plain_body: String,
}

/// The orchestration layer over lifecycle, host, and describe collaborators
pub struct SubmitPipeline {
    lifecycle: Arc<BranchLifecycle>,
    host: Arc<dyn PrHost>,
    describe: Arc<dyn Describe>,
    diff_policy: DiffPolicy,
    draft: bool,
    trunk_override: Option<String>,
}

impl SubmitPipeline {
    pub fn new(lifecycle: Arc<BranchLifecycle>, host: Arc<dyn PrHost>, describe: Arc<dyn Describe>) -> Self {
        Self {
            lifecycle,
            host,
            describe,
            diff_policy: DiffPolicy::default(),
            draft: true,
            trunk_override: None,
        }
    }

    pub fn with_diff_policy(mut self, policy: DiffPolicy) -> Self {
        self.diff_policy = policy;
        self
    }

    /// Create PRs ready-for-review instead of draft-first
    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    /// Use a configured trunk instead of detecting one
    pub fn with_trunk(mut self, trunk: Option<String>) -> Self {
        self.trunk_override = trunk;
        self
    }

    /// Run the whole pipeline for one branch
    pub async fn run(&self, req: &SubmitRequest) -> Result<SubmitReceipt, SubmitError> {
        let mut state = SubmitState::default();
        let trunk = match &self.trunk_override {
            Some(t) => t.clone(),
            None => self.lifecycle.gateway().trunk_branch().await?,
        };

        self.resolve_existing(req, &mut state).await?;
        self.divergence_guard(req, &mut state).await?;
        self.stacked_parent_guard(req, &trunk, &mut state).await?;
        self.publish(req, &state).await?;
        self.compose(req, &trunk, &mut state).await?;
        self.create_or_update(req, &mut state).await?;
        self.finalize_footer(&mut state).await?;
        let ready = self.transition_ready(req, &state).await?;

        let pr = state.pr.expect("pipeline finished without a PR number");
        debug!(
            diff_bytes = state.diff.as_ref().map_or(0, String::len),
            base = state.base.as_deref().unwrap_or(""),
            "final pipeline state"
        );
        info!(branch = %req.branch, pr, created = state.created, ready, "submission complete");

        Ok(SubmitReceipt {
            pr,
            created: state.created,
            ready,
            plain_body: format!(
                "{}\n\n{}",
                state.description.unwrap_or_default().trim_end(),
                plain_footer(pr)
            ),
        })
    }

    /// Phase 1: route to create or update
    async fn resolve_existing(&self, req: &SubmitRequest, state: &mut SubmitState) -> Result<(), SubmitError> {
        match self.host.find_pr_by_branch(&req.branch).await? {
            PrLookup::Found(pr) => {
                if req.exclusive {
                    return Err(SubmitError::PrAlreadyExists {
                        branch: req.branch.clone(),
                        number: pr.number,
                    });
                }
                debug!(branch = %req.branch, pr = pr.number, "existing PR, updating in place");
                state.existing = Some(pr.number);
                state.existing_body = pr.body;
                state.existing_draft = pr.draft;
            }
            PrLookup::NotFound => {
                debug!(branch = %req.branch, "no existing PR, will create");
            }
        }
        Ok(())
    }

    /// Phase 2: caller-specific divergence policy
    async fn divergence_guard(&self, req: &SubmitRequest, state: &mut SubmitState) -> Result<(), SubmitError> {
        state.forced = req.force || req.freshly_created;

        let counts = match self.lifecycle.gateway().divergence(&req.branch).await? {
            // Never pushed: nothing to guard
            RemoteStatus::NotOnRemote => return Ok(()),
            RemoteStatus::Compared(d) => d,
        };

        if !counts.is_behind() {
            return Ok(());
        }

        if state.forced {
            warn!(branch = %req.branch, behind = counts.behind, "diverged but forced, remote history will be lost");
            return Ok(());
        }

        match self.lifecycle.backend_kind() {
            // This path fully controls the push, so catching up is safe
            BackendKind::Plain => {
                info!(branch = %req.branch, behind = counts.behind, "behind remote, auto-rebasing");
                let onto = format!("{}/{}", self.lifecycle.gateway().remote(), req.branch);
                self.lifecycle.gateway().rebase(&req.workdir, &onto).await?;
                Ok(())
            }
            // The stack tool's publish behaves unpredictably on a diverged
            // branch; stop and make the operator decide
            BackendKind::Stacked => Err(SubmitError::RemoteDiverged {
                branch: req.branch.clone(),
                ahead: counts.ahead,
                behind: counts.behind,
            }),
        }
    }

    /// Phase 3: a tracked parent without a PR means this PR would target
    /// trunk and silently fold the parent's commits in
    async fn stacked_parent_guard(
        &self,
        req: &SubmitRequest,
        trunk: &str,
        state: &mut SubmitState,
    ) -> Result<(), SubmitError> {
        let parent = self.lifecycle.parent(&req.branch).await?;

        let base = match parent {
            Some(p) if p != trunk => {
                if matches!(self.host.find_pr_by_branch(&p).await?, PrLookup::NotFound) {
                    return Err(SubmitError::StackedParentMissingPr { parent: p });
                }
                p
            }
            _ => trunk.to_string(),
        };

        state.base = Some(base);
        Ok(())
    }

    /// Phase 4: push or stack-publish through the lifecycle manager
    async fn publish(&self, req: &SubmitRequest, state: &SubmitState) -> Result<(), SubmitError> {
        self.lifecycle
            .submit(&req.branch, state.forced)
            .await
            .map_err(|e| SubmitError::PushFailed { stderr: e.diagnostic() })
    }

    /// Phases 5-6 input: diff extraction and description synthesis
    async fn compose(&self, req: &SubmitRequest, trunk: &str, state: &mut SubmitState) -> Result<(), SubmitError> {
        let base = state.base.as_deref().unwrap_or(trunk);

        let raw = self.lifecycle.gateway().diff(base, &req.branch).await?;
        let diff = filter_diff(&raw, &self.diff_policy);
        let subjects = self.lifecycle.gateway().log_subjects(base, &req.branch).await?;

        let description = self.describe.describe(&req.branch, &subjects, &diff).await?;
        state.diff = Some(diff);
        state.description = Some(description);
        Ok(())
    }

    /// Phase 5: create as draft (with the closing reference already in the
    /// body; the host only honors it at creation time) or update in place
    async fn create_or_update(&self, req: &SubmitRequest, state: &mut SubmitState) -> Result<(), SubmitError> {
        let description = state.description.clone().unwrap_or_default();
        let closes = req.link.as_ref().map(|l| l.closing_reference());

        match state.existing {
            None => {
                let mut body = description.trim_end().to_string();
                if let Some(closes) = &closes {
                    body.push_str("\n\n");
                    body.push_str(closes);
                }

                let base = state.base.clone().unwrap_or_default();
                let number = self
                    .host
                    .create_pr(&req.branch, &base, &self.title(req), &body, self.draft)
                    .await?;
                state.pr = Some(number);
                state.created = true;
            }
            Some(number) => {
                let existing = state.existing_body.clone().unwrap_or_default();
                let body = merge_body(&existing, &description, req.link.as_ref());
                self.host.update_body(number, &body).await?;
                state.pr = Some(number);
                state.existing_body = Some(body);
            }
        }
        Ok(())
    }

    /// Phase 7: append the footer carrying the PR's own number
    async fn finalize_footer(&self, state: &mut SubmitState) -> Result<(), SubmitError> {
        let pr = state.pr.expect("footer phase before create/update");

        let core = match &state.existing_body {
            Some(body) if state.existing.is_some() => strip_footer(body),
            _ => {
                let mut body = state.description.clone().unwrap_or_default().trim_end().to_string();
                if let Ok(PrLookup::Found(details)) = self.host.get_pr(pr).await {
                    body = strip_footer(details.body.as_deref().unwrap_or(&body));
                }
                body
            }
        };

        let body = format!("{}\n\n{}", core.trim_end(), github_footer(pr));
        self.host.update_body(pr, &body).await?;
        Ok(())
    }

    /// Phase 8: draft gates CI until content is final; flip it now
    async fn transition_ready(&self, req: &SubmitRequest, state: &SubmitState) -> Result<bool, SubmitError> {
        let pr = state.pr.expect("ready phase before create/update");
        let is_draft = if state.created { self.draft } else { state.existing_draft };

        if !is_draft || req.keep_draft {
            return Ok(!is_draft);
        }

        self.host.mark_ready(pr).await?;
        Ok(true)
    }

    fn title(&self, req: &SubmitRequest) -> String {
        match WorkBranch::parse(&req.branch) {
            Some(wb) => format!("P{}: {}", wb.item, wb.slug.replace('-', " ")),
            None => req.branch.clone(),
        }
    }
}

/// Update-path body merge: regenerate, but never lose structural content
/// the existing body already had
fn merge_body(existing: &str, generated: &str, link: Option<&WorkItemLink>) -> String {
    let existing_core = strip_footer(existing);
    let mut body = generated.trim_end().to_string();

    // Keep the collapsible plan section if regeneration dropped it
    if !body.contains("<details>")
        && let Some(plan) = extract_details(&existing_core)
    {
        body.push_str("\n\n");
        body.push_str(plan);
    }

    if let Some(link) = link
        && !has_closing_reference(&body, link.issue_number, link.plans_repo.as_deref())
    {
        body.push_str("\n\n");
        body.push_str(&link.closing_reference());
    }

    body
}

/// First `<details>...</details>` block, tags included
fn extract_details(body: &str) -> Option<&str> {
    let start = body.find("<details>")?;
    let end = body[start..].find("</details>")? + start + "</details>".len();
    Some(&body[start..end])
}
