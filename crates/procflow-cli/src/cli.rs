//! CLI argument definitions for procflow.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// procflow -- load process descriptions into a relational model.
#[derive(Parser)]
#[command(
    name = "procflow",
    version,
    about = "procflow -- process-text parser and committer",
    long_about = "Parses the Start:/End:/Task:/Condition:/From: text a language model \
                  produces, resolves flow references, and commits the resulting process \
                  graph to SQLite in a single transaction."
)]
pub struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Database path, overriding configuration and environment.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and apply migrations.
    Init,

    /// Parse and resolve a block without touching the database.
    Check {
        /// File holding the block; reads stdin when omitted.
        file: Option<PathBuf>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Parse, resolve and commit a block.
    Ingest {
        /// File holding the block; reads stdin when omitted.
        file: Option<PathBuf>,

        /// Print the commit result as JSON.
        #[arg(long)]
        json: bool,

        /// Commit timeout in milliseconds, overriding configuration.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Show stored row counts and the flows of a block.
    Show {
        /// Block id; defaults to the most recent block.
        #[arg(long)]
        block: Option<String>,
    },
}
