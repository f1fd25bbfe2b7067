//! CLI argument parsing and command dispatch

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use crate::commands;

/// Insiders Mirror - keep insiders packages published on a local index
#[derive(Parser, Debug)]
#[command(name = "insiders-mirror")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(short = 'L', long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Write log messages to this file path instead of stderr
    #[arg(short = 'P', long, global = true, value_name = "FILE")]
    log_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the tracked repositories
    Repos(commands::repos::ReposArgs),
    /// Reconcile tracked repositories against the index once
    Update(commands::update::UpdateArgs),
    /// Manage the local package index server
    Server(commands::server::ServerArgs),
    /// Manage the background update watcher
    Watcher(commands::watcher::WatcherArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level, self.log_path.as_deref())?;

        let Some(command) = self.command else {
            // No subcommand: print help and exit with a failure code
            Cli::command().print_help().ok();
            std::process::exit(1);
        };

        match command {
            Commands::Repos(args) => commands::repos::execute(args),
            Commands::Update(args) => commands::update::execute(args),
            Commands::Server(args) => commands::server::execute(args),
            Commands::Watcher(args) => commands::watcher::execute(args),
        }
    }
}

/// Initialize the process-wide logger.
///
/// Single-call contract: runs once before any command logs. The level comes
/// from `--log-level` (overridable through `RUST_LOG`), and `--log-path`
/// redirects output from stderr to a file.
fn init_logging(level: &str, log_path: Option<&std::path::Path>) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    if let Some(path) = log_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory for {}", path.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file) as Box<dyn Write + Send>));
    }

    builder.try_init().ok();
    Ok(())
}
