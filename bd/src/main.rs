//! BranchDeck - worktree slots, branch lifecycle, PR submission
//!
//! CLI entry point. Commands are thin dispatch over the library; all policy
//! lives in the modules.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use branchdeck::branch::{BranchLifecycle, WorkBranch, create_backend};
use branchdeck::check::{CheckReport, CheckResult};
use branchdeck::cli::{BranchCommand, Cli, Command, PoolCommand, SlotCommand};
use branchdeck::config::Config;
use branchdeck::github::{GhClient, PrHost, PrLookup};
use branchdeck::slot::{SlotPool, SlotState};
use branchdeck::submit::{CommitLogDescribe, DiffPolicy, SubmitPipeline, SubmitRequest};
use branchdeck::workitem::WorkItemLink;
use gitgate::GitGateway;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("branchdeck")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("branchdeck.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Everything a command needs, built once
struct App {
    config: Config,
    gateway: GitGateway,
    lifecycle: Arc<BranchLifecycle>,
}

impl App {
    async fn open(config: Config) -> Result<Self> {
        let gateway = GitGateway::open(".").await?;
        let backend = create_backend(&config, gateway.clone());
        let lifecycle = Arc::new(BranchLifecycle::new(gateway.clone(), backend));
        Ok(Self {
            config,
            gateway,
            lifecycle,
        })
    }

    fn pool(&self) -> SlotPool {
        SlotPool::new(self.config.pool.resolve_dir(), self.config.pool.size, self.lifecycle.clone())
    }

    fn host(&self) -> Arc<GhClient> {
        Arc::new(GhClient::new(self.gateway.repo_root()))
    }

    async fn trunk(&self) -> Result<String> {
        match &self.config.git.trunk {
            Some(t) => Ok(t.clone()),
            None => Ok(self.gateway.trunk_branch().await?),
        }
    }

    /// Linkage file, with the configured plans repo as fallback qualifier
    fn link(&self) -> Result<Option<WorkItemLink>> {
        let mut link = WorkItemLink::load(self.gateway.repo_root())?;
        if let Some(link) = link.as_mut()
            && link.plans_repo.is_none()
        {
            link.plans_repo = self.config.github.plans_repo.clone();
        }
        Ok(link)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    let app = App::open(config).await?;

    debug!(command = ?cli.command, "dispatching command");
    match cli.command {
        Command::Pool { command } => match command {
            PoolCommand::Init { size } => cmd_pool_init(&app, size).await,
            PoolCommand::List { all } => cmd_pool_list(&app, all).await,
            PoolCommand::Destroy { slot, force } => cmd_pool_destroy(&app, slot, force).await,
        },
        Command::Slot { command } => match command {
            SlotCommand::Assign { slot, branch, reassign } => cmd_slot_assign(&app, slot, &branch, reassign).await,
            SlotCommand::Unassign { slot } => cmd_slot_unassign(&app, slot).await,
        },
        Command::Branch { command } => match command {
            BranchCommand::New {
                description,
                item,
                parent_item,
                base,
                slot,
            } => cmd_branch_new(&app, &description.join(" "), item, parent_item, base, slot).await,
            BranchCommand::Delete { name } => cmd_branch_delete(&app, &name).await,
        },
        Command::Submit {
            branch,
            force,
            review,
            draft,
        } => cmd_submit(&app, branch, force, review, draft).await,
        Command::Check { pr, branch } => cmd_check(&app, pr, branch).await,
        Command::Checkout { pr } => cmd_checkout(&app, pr).await,
        Command::Dispatch { workflow, git_ref } => cmd_dispatch(&app, &workflow, git_ref).await,
    }
}

async fn cmd_pool_init(app: &App, size: Option<usize>) -> Result<()> {
    let size = size.unwrap_or(app.config.pool.size);
    let pool = SlotPool::new(app.config.pool.resolve_dir(), size, app.lifecycle.clone());

    pool.init().await?;
    println!("{} Pool ready: {} slot(s)", "✓".green(), pool.size());
    Ok(())
}

async fn cmd_pool_list(app: &App, all: bool) -> Result<()> {
    let pool = app.pool();
    let slots = pool.list(all).await?;

    if slots.is_empty() {
        println!("No {} slots", if all { "initialized" } else { "assigned" });
        return Ok(());
    }

    for slot in slots {
        match slot.state {
            SlotState::Empty => {
                println!("slot {:02}  {}  {}", slot.id, "empty".dimmed(), slot.path.display().to_string().dimmed());
            }
            SlotState::Assigned { branch } => {
                println!("slot {:02}  {}  {}", slot.id, branch.cyan(), slot.path.display().to_string().dimmed());
            }
        }
    }
    Ok(())
}

async fn cmd_pool_destroy(app: &App, slot: usize, force: bool) -> Result<()> {
    app.pool().destroy(slot, force).await?;
    println!("{} Destroyed slot {:02}", "✓".green(), slot);
    Ok(())
}

async fn cmd_slot_assign(app: &App, slot: usize, branch: &str, reassign: bool) -> Result<()> {
    app.pool().assign(slot, branch, reassign).await?;
    println!("{} Slot {:02} now holds {}", "✓".green(), slot, branch.cyan());
    Ok(())
}

async fn cmd_slot_unassign(app: &App, slot: usize) -> Result<()> {
    match app.pool().unassign(slot).await? {
        Some(released) => {
            println!("{} Slot {:02} emptied; {} kept for the lander", "✓".green(), slot, released.cyan());
        }
        None => println!("Slot {:02} was already empty", slot),
    }
    Ok(())
}

async fn cmd_branch_new(
    app: &App,
    description: &str,
    item: Option<u64>,
    parent_item: Option<u64>,
    base: Option<String>,
    slot: Option<usize>,
) -> Result<()> {
    let item = match item.or(app.link()?.map(|l| l.issue_number)) {
        Some(item) => item,
        None => {
            return Err(eyre::eyre!(
                "no work-item number: pass --item or create {} first",
                branchdeck::workitem::LINK_FILE
            ));
        }
    };

    let base = match base {
        Some(b) => b,
        None => app.trunk().await?,
    };

    let name = WorkBranch::new(item, parent_item, description, Local::now()).name();
    app.lifecycle.create(&name, &base).await?;
    println!("{} Created {} from {}", "✓".green(), name.cyan(), base);

    if let Some(slot) = slot {
        app.pool().assign(slot, &name, false).await?;
        println!("{} Assigned to slot {:02}", "✓".green(), slot);
    }
    Ok(())
}

async fn cmd_branch_delete(app: &App, name: &str) -> Result<()> {
    app.lifecycle.delete(name).await?;
    println!("{} Deleted {}", "✓".green(), name);
    Ok(())
}

async fn cmd_submit(app: &App, branch: Option<String>, force: bool, review: bool, draft: bool) -> Result<()> {
    let workdir = app.gateway.repo_root().to_path_buf();
    let branch = match branch {
        Some(b) => b,
        None => app.gateway.current_branch(&workdir).await?,
    };

    let pipeline = SubmitPipeline::new(app.lifecycle.clone(), app.host(), Arc::new(CommitLogDescribe))
        .with_draft(app.config.submit.draft)
        .with_trunk(app.config.git.trunk.clone())
        .with_diff_policy(DiffPolicy {
            max_bytes: app.config.submit.max_diff_bytes,
            ..DiffPolicy::default()
        });

    let mut req = SubmitRequest::new(&branch, &workdir);
    req.force = force;
    req.exclusive = review;
    req.keep_draft = draft;
    req.link = app.link()?;

    match pipeline.run(&req).await {
        Ok(receipt) => {
            let verb = if receipt.created { "Created" } else { "Updated" };
            let status = if receipt.ready { "ready for review" } else { "draft" };
            println!("{} {} PR #{} ({})", "✓".green(), verb, receipt.pr, status);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}

async fn cmd_check(app: &App, pr: Option<u64>, branch: Option<String>) -> Result<()> {
    let host = app.host();

    let lookup = match (pr, branch) {
        (Some(number), _) => host.get_pr(number).await?,
        (None, Some(branch)) => host.find_pr_by_branch(&branch).await?,
        (None, None) => {
            let current = app.gateway.current_branch(app.gateway.repo_root()).await?;
            host.find_pr_by_branch(&current).await?
        }
    };

    let PrLookup::Found(details) = lookup else {
        eprintln!("{} No pull request found", "✗".red());
        std::process::exit(1);
    };

    let link = app.link()?;
    let report = CheckReport::evaluate(&details, link.as_ref());

    print_check("footer", &report.footer);
    print_check("closes", &report.closes);
    print_check("linkage", &report.linkage);

    if !report.passed() {
        std::process::exit(1);
    }
    println!("{} PR #{} passes all checks", "✓".green(), details.number);
    Ok(())
}

fn print_check(name: &str, result: &CheckResult) {
    match result {
        CheckResult::Pass => println!("{} {}", "✓".green(), name),
        CheckResult::Fail(reason) => println!("{} {}: {}", "✗".red(), name, reason),
        CheckResult::Skipped(reason) => println!("{} {}: {}", "-".dimmed(), name, reason.dimmed()),
    }
}

async fn cmd_checkout(app: &App, pr: u64) -> Result<()> {
    let host = app.host();
    let PrLookup::Found(details) = host.get_pr(pr).await? else {
        eprintln!("{} PR #{} not found", "✗".red(), pr);
        std::process::exit(1);
    };

    app.gateway.fetch_branch(&details.head).await?;
    if !app.gateway.branch_exists(&details.head).await? {
        let remote_ref = format!("{}/{}", app.gateway.remote(), details.head);
        app.gateway.create_branch(&details.head, &remote_ref, false).await?;
    }

    let root = app.gateway.repo_root().to_path_buf();
    app.lifecycle.checkout(&root, &details.head).await?;
    println!("{} Checked out {} (PR #{})", "✓".green(), details.head.cyan(), pr);
    Ok(())
}

async fn cmd_dispatch(app: &App, workflow: &str, git_ref: Option<String>) -> Result<()> {
    let git_ref = match git_ref {
        Some(r) => r,
        None => app.trunk().await?,
    };

    let run_id = app.host().dispatch_workflow(workflow, &git_ref).await?;
    println!("{} Dispatched {} on {} (run {})", "✓".green(), workflow, git_ref.cyan(), run_id);
    Ok(())
}
