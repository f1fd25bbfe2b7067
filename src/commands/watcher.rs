//! # Watcher Command Implementation
//!
//! Lifecycle around the background update watcher: the foreground `run` loop
//! reconciles every tracked repository on an interval with cooperative
//! signal shutdown, and `start`/`status`/`stop`/`logs` manage it as a
//! daemon through its PID file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use insiders_mirror::cache::RepositoryCache;
use insiders_mirror::config::RepositoryConfig;
use insiders_mirror::defaults;
use insiders_mirror::index::PackageIndex;
use insiders_mirror::process::Daemon;
use insiders_mirror::watcher::{install_signal_handlers, watch, ShutdownFlag};

/// Manage the background update watcher
#[derive(Args, Debug)]
pub struct WatcherArgs {
    /// Repository configuration file path.
    #[arg(short = 'c', long, value_name = "FILE", env = "INSIDERS_MIRROR_CONF")]
    pub conf_path: Option<PathBuf>,

    /// Directory containing the repository clones.
    #[arg(short = 'r', long, value_name = "DIR", env = "INSIDERS_MIRROR_CACHE")]
    pub repo_dir: Option<PathBuf>,

    /// URL of the package index to query and upload to.
    #[arg(short = 'i', long, value_name = "URL", env = "INSIDERS_MIRROR_INDEX")]
    pub index_url: Option<String>,

    /// Seconds to sleep between reconciliation cycles.
    #[arg(short = 's', long, value_name = "SECONDS", default_value_t = defaults::DEFAULT_WATCHER_SLEEP)]
    pub sleep: u64,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: WatcherSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum WatcherSubcommand {
    /// Start the watcher in the background
    Start,
    /// Show whether the watcher is running
    Status,
    /// Stop the background watcher
    Stop,
    /// Run the watch loop in the foreground
    Run,
    /// Print recent watcher log lines
    Logs(LogsArgs),
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

/// Execute the `watcher` command.
pub fn execute(args: WatcherArgs) -> Result<()> {
    let daemon = Daemon::new("watcher", defaults::default_run_dir());
    let conf_path = args.conf_path.unwrap_or_else(defaults::default_conf_path);
    let repo_dir = args.repo_dir.unwrap_or_else(defaults::default_repo_dir);
    let index_url = args.index_url.unwrap_or_else(defaults::default_index_url);

    match args.command {
        WatcherSubcommand::Start => {
            // Options belong to `watcher`, so they go before the subcommand
            let status = daemon.spawn(&[
                "watcher".to_string(),
                format!("--conf-path={}", conf_path.display()),
                format!("--repo-dir={}", repo_dir.display()),
                format!("--index-url={}", index_url),
                format!("--sleep={}", args.sleep),
                "run".to_string(),
                "--log-level=debug".to_string(),
            ])?;
            println!(
                "watcher started (pid {}, logs: {})",
                status.pid,
                status.log_path.display()
            );
        }
        WatcherSubcommand::Status => match daemon.status()? {
            Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
            None => println!("watcher is not running"),
        },
        WatcherSubcommand::Stop => {
            if daemon.stop()? {
                println!("watcher stopped");
            } else {
                println!("watcher is not running");
            }
        }
        WatcherSubcommand::Run => {
            let flag = ShutdownFlag::new();
            install_signal_handlers(&flag);
            daemon.write_own_pid()?;

            let config = RepositoryConfig::new(conf_path);
            let cache = RepositoryCache::new(repo_dir);
            let index = PackageIndex::new(&index_url)
                .with_context(|| format!("invalid index URL {}", index_url))?;
            let result = watch(
                &config,
                &cache,
                &index,
                Duration::from_secs(args.sleep),
                &flag,
            );

            daemon.clear_own_pid()?;
            result?;
        }
        WatcherSubcommand::Logs(logs) => daemon.tail(logs.lines)?,
    }

    Ok(())
}
