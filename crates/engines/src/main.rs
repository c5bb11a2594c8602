//! VulnSentinel CLI: run the full pipeline or a single stage.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agent::LlmClient;
use engines::wiring::{build_scheduler, Runners};
use engines::Config;
use github::GitHubClient;

/// VulnSentinel: upstream vulnerability discovery for C/C++ dependencies.
#[derive(Parser)]
#[command(name = "vulnsentinel")]
#[command(about = "Upstream vulnerability discovery pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline until interrupted
    Serve,
    /// Run one dependency-scan batch and exit
    Scan,
    /// Run one event-collection batch and exit
    Collect,
    /// Run one classification batch and exit
    Classify,
    /// Run one vulnerability-analysis batch and exit
    Analyze,
    /// Run one impact-matching batch and exit
    Impact,
    /// Run one reachability batch and exit
    Reachability,
    /// Run one notification batch and exit
    Notify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let github = Arc::new(GitHubClient::new(config.github_token.as_deref())?);
    let llm = LlmClient::from_env();

    // The call-graph store and the manifest scanners are external
    // collaborators; deployments link concrete implementations here.
    let runners = Runners::build(&config, pool, github, llm, None, None);

    match cli.command {
        Commands::Serve => {
            let mut scheduler = build_scheduler(&config, runners);
            scheduler.start();
            tokio::signal::ctrl_c().await?;
            scheduler.stop().await;
        }
        Commands::Scan => {
            let scanned = match &runners.scanner {
                Some(runner) => runner.run_batch().await?,
                None => 0,
            };
            println!("projects scanned: {scanned}");
        }
        Commands::Collect => {
            let results = runners.collector.run_all().await?;
            let inserted: u64 = results.iter().map(|r| r.inserted).sum();
            println!(
                "libraries collected: {}, events inserted: {inserted}",
                results.len()
            );
        }
        Commands::Classify => {
            let classified = runners.classifier.classify_batch().await?;
            println!("events classified: {classified}");
        }
        Commands::Analyze => {
            let analyzed = runners.analyzer.analyze_batch().await?;
            println!("events analyzed: {analyzed}");
        }
        Commands::Impact => {
            let created = runners.impact.run_batch().await?;
            println!("client vulns created: {created}");
        }
        Commands::Reachability => {
            let processed = match &runners.reachability {
                Some(runner) => runner.run_batch().await?,
                None => 0,
            };
            println!("client vulns processed: {processed}");
        }
        Commands::Notify => {
            let sent = runners.notification.run_batch().await?;
            println!("notifications sent: {sent}");
        }
    }

    Ok(())
}
