//! Nachala operator CLI
//!
//! Inspect a portfolio file offline: recompute the integrity report, dry-run
//! a release, or list committed distributions. The portfolio loads into the
//! in-memory backend, so nothing here touches a live deployment.
//!
//! ```bash
//! # Integrity report (exit code 1 when unhealthy)
//! nachala --portfolio estate.toml check
//!
//! # Release dry run: operations plus skip diagnostics
//! nachala --portfolio estate.toml plan
//!
//! # Assets with committed and staged distributions
//! nachala --portfolio estate.toml show
//! ```

mod portfolio;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nachala_ledger::CollectingDispatcher;
use portfolio::PortfolioFile;

#[derive(Parser, Debug)]
#[command(name = "nachala")]
#[command(about = "Distribution ledger inspection for Nachala portfolios")]
struct Args {
    /// Path to the portfolio TOML file
    #[arg(short, long, env = "NACHALA_PORTFOLIO", default_value_os_t = portfolio::default_portfolio_path())]
    portfolio: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recompute the integrity report over committed state
    Check,
    /// Dry-run a release: operations plus skip diagnostics
    Plan,
    /// List assets with their committed and staged distributions
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let file = PortfolioFile::load(&args.portfolio)
        .with_context(|| format!("failed to load portfolio {}", args.portfolio.display()))?;
    let (_backend, session) = portfolio::open_session(&file).await?;

    match args.command {
        Command::Check => {
            let report = session.check_integrity().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }
        Command::Plan => {
            let dispatcher = CollectingDispatcher::new();
            let plan = session.execute_release(&dispatcher).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Show => {
            let partial = session.partial_assets().await;
            for asset in session.assets().await {
                println!(
                    "{} [{}] value={} custody={}",
                    asset.name,
                    asset.id,
                    asset.value,
                    serde_json::to_string(&asset.custody)?.trim_matches('"')
                );
                for share in session.get_shares(&asset.id).await? {
                    println!("  {} -> {}%", share.heir_id, share.percentage);
                }
                if partial.contains(&asset.id) {
                    for share in session.staged_shares(&asset.id).await? {
                        println!("  {} -> {}% (staged, not saved)", share.heir_id, share.percentage);
                    }
                }
            }
        }
    }

    Ok(())
}
