//! keeper CLI - keep command

use anyhow::Result;
use clap::{Parser, Subcommand};
use journal::PolicyKind;
use std::io::IsTerminal;

mod cmd;
mod config;
mod util;

/// keeper - commit retention with snapshot protection
#[derive(Parser)]
#[command(name = "keep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository in the current directory
    Init {
        /// Retention policy (keep_only_last, keep_last_n, keep_all)
        #[arg(long, default_value = "keep_only_last")]
        policy: PolicyKind,
        /// Commits to keep with keep_last_n
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        keep: i64,
        /// Keep snapshots in memory only
        #[arg(long)]
        no_durable: bool,
    },
    /// Record a new commit and apply retention
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },
    /// Show surviving commits, newest first
    Log {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Pin the newest commit against deletion
    Snapshot,
    /// List outstanding snapshots
    Snapshots,
    /// Release a snapshot by id
    Release {
        /// Snapshot id printed by `keep snapshot`
        id: String,
    },
    /// Re-apply retention and report what was reclaimed
    Gc,
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    // Initialize tracing; KEEP_LOG overrides the default level
    let level = std::env::var("KEEP_LOG")
        .ok()
        .and_then(|v| v.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { policy, keep, no_durable } => cmd::init::run(policy, keep, no_durable),
        Commands::Commit { message } => cmd::commit::run(&message),
        Commands::Log { json } => cmd::log::run(json),
        Commands::Snapshot => cmd::snapshot::run(),
        Commands::Snapshots => cmd::snapshot::run_list(),
        Commands::Release { id } => cmd::release::run(&id),
        Commands::Gc => cmd::gc::run(),
        Commands::Config => cmd::config::run(),
    }
}
