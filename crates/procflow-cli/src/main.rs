//! CLI entry point for procflow.
//!
//! This binary provides the `procflow` command with subcommands for
//! preparing the database, checking a block, committing a block, and
//! inspecting what has been stored.

mod cli;
mod config;
mod helpers;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use procflow_parse::{BlockReport, parse_block};
use procflow_store::{Database, ProcessCommitter, ProcessReader};
use tracing::{error, info, warn};

use crate::cli::{Cli, Commands};
use crate::config::ProcflowConfig;
use crate::helpers::{
    init_tracing, read_block, render_block, render_commit, render_counts, render_flows,
    render_report,
};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = ProcflowConfig::load(&cli.config);
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    init_tracing(&config.log.level);

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Check { file, json } => cmd_check(file.as_deref(), json),
        Commands::Ingest {
            file,
            json,
            timeout_ms,
        } => cmd_ingest(&config, file.as_deref(), json, timeout_ms).await,
        Commands::Show { block } => cmd_show(&config, block).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: init
// ---------------------------------------------------------------------------

async fn cmd_init(config: &ProcflowConfig) -> Result<()> {
    let db_path = &config.store.path;
    open_store(db_path).await?;

    println!();
    println!("  procflow v{}", env!("CARGO_PKG_VERSION"));
    println!("  Database ready at {}", db_path.display());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: check
// ---------------------------------------------------------------------------

fn cmd_check(file: Option<&Path>, json: bool) -> Result<()> {
    let text = read_block(file)?;
    let report = BlockReport::from(&parse_block(&text));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        println!();
        print!("{}", render_report(&report));
        println!();
    }

    if !report.is_clean() {
        warn!(
            skipped = report.skipped.len(),
            unresolved = report.unresolved.len(),
            "block has diagnostics"
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    config: &ProcflowConfig,
    file: Option<&Path>,
    json: bool,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let text = read_block(file)?;
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.commit_timeout());

    let db = open_store(&config.store.path).await?;
    let committer = ProcessCommitter::with_timeout(db, timeout);

    let result = match committer.commit(parse_block(&text)).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "commit failed, block rolled back");
            if e.is_retryable() {
                eprintln!("  Nothing was stored; the commit can be retried.");
            } else {
                eprintln!("  Nothing was stored; retrying will not help.");
            }
            return Err(e).context("failed to commit block");
        }
    };

    info!(
        block_id = %result.block_id,
        flows = result.flows,
        unresolved = result.unresolved.len(),
        skipped = result.skipped.len(),
        "block ingested"
    );

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("failed to serialize commit result")?
        );
    } else {
        println!();
        print!("{}", render_commit(&result));
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: show
// ---------------------------------------------------------------------------

async fn cmd_show(config: &ProcflowConfig, block: Option<String>) -> Result<()> {
    let db = open_store(&config.store.path).await?;
    let reader = ProcessReader::new(db);

    let counts = reader.counts().await.context("failed to count rows")?;
    println!();
    println!("  Database: {}", config.store.path.display());
    print!("{}", render_counts(&counts));

    let stored = match block {
        Some(id) => Some(
            reader
                .block(&id)
                .await
                .with_context(|| format!("failed to read block {id}"))?,
        ),
        None => reader
            .latest_block()
            .await
            .context("failed to read latest block")?,
    };

    match stored {
        Some(stored) => {
            let flows = reader
                .flows(&stored.id)
                .await
                .with_context(|| format!("failed to read flows of block {}", stored.id))?;
            println!();
            print!("{}", render_block(&stored));
            println!("  Flows ({}):", flows.len());
            print!("{}", render_flows(&flows));
        }
        None => println!("  No blocks committed yet."),
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open the database at `path`, creating its parent directory and applying
/// pending migrations.
async fn open_store(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = Database::open_and_migrate(path.to_path_buf())
        .await
        .context("failed to open database")?;
    info!(path = %path.display(), "store initialized");
    Ok(db)
}
