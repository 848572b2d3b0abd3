//! Command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::error::Result;

/// balanced-queue - fair job-dispatch broker over Redis.
#[derive(Parser, Debug)]
#[command(name = "balanced-queue")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (TOML).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the metrics endpoint.
    Serve(commands::ServeArgs),
    /// Show per-partition queue state, one-shot or watched.
    Table(commands::TableArgs),
    /// Clear a partition or a whole queue.
    Clear(commands::ClearArgs),
}

/// Dispatch a parsed invocation.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve(args) => commands::run_serve(settings, args).await,
        Commands::Table(args) => commands::run_table(settings, args).await,
        Commands::Clear(args) => commands::run_clear(settings, args).await,
    }
}
