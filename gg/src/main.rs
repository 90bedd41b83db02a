use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use gitgate::cli::{Cli, Command};
use gitgate::config::Config;
use gitgate::{GitGateway, RemoteStatus};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("gitgate starting");
    let gate = GitGateway::open(&config.repo_root).await?;

    match cli.command {
        Command::Trunk => {
            println!("{}", gate.trunk_branch().await?);
        }
        Command::Diverged { branch, json } => match gate.divergence(&branch).await? {
            RemoteStatus::NotOnRemote => {
                if json {
                    println!("{}", serde_json::to_string(&RemoteStatus::NotOnRemote)?);
                } else {
                    println!("{} {} is not on the remote", "-".dimmed(), branch.cyan());
                }
            }
            RemoteStatus::Compared(d) => {
                if json {
                    println!("{}", serde_json::to_string(&RemoteStatus::Compared(d))?);
                } else if d.is_identical() {
                    println!("{} {} matches the remote", "✓".green(), branch.cyan());
                } else {
                    println!("{} {} {}", "!".yellow(), branch.cyan(), d);
                }
            }
        },
        Command::Exists { branch, remote } => {
            let exists = if remote {
                gate.remote_branch_exists(&branch).await?
            } else {
                gate.branch_exists(&branch).await?
            };
            if exists {
                println!("{} {}", "✓".green(), branch);
            } else {
                println!("{} {}", "✗".red(), branch);
                std::process::exit(1);
            }
        }
        Command::Head { dir } => {
            let dir = dir.unwrap_or_else(|| config.repo_root.clone());
            println!("{}", gate.current_branch(&dir).await?);
        }
    }

    Ok(())
}
