//! # Server Command Implementation
//!
//! Lifecycle wrapper around the external package index server
//! (`pypi-server`). The index server itself is an external collaborator; this
//! command only starts it, watches it, and stops it.
//!
//! ## Subcommands
//!
//! - **`run`**: run the index server in the foreground, supervising the
//!   `pypi-server` subprocess and forwarding termination signals to it.
//! - **`start`**: spawn `insiders-mirror server run` as a background daemon.
//! - **`status`**: report the daemon's PID and log file as JSON.
//! - **`stop`**: terminate the background daemon.
//! - **`logs`**: print the last lines of the daemon log.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use insiders_mirror::defaults;
use insiders_mirror::process::Daemon;
use insiders_mirror::watcher::{install_signal_handlers, ShutdownFlag};

/// Manage the local package index server
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Directory holding the distribution artifacts to serve.
    #[arg(short = 'd', long, value_name = "DIR", env = "INSIDERS_MIRROR_DIST")]
    pub dist_dir: Option<PathBuf>,

    /// Port to serve the package index on.
    #[arg(short = 'p', long, value_name = "PORT", default_value_t = defaults::DEFAULT_PORT)]
    pub port: u16,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: ServerSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ServerSubcommand {
    /// Start the index server in the background
    Start,
    /// Show whether the index server is running
    Status,
    /// Stop the background index server
    Stop,
    /// Run the index server in the foreground
    Run,
    /// Print recent index server log lines
    Logs(LogsArgs),
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

/// Execute the `server` command.
pub fn execute(args: ServerArgs) -> Result<()> {
    let daemon = Daemon::new("server", defaults::default_run_dir());
    let dist_dir = args.dist_dir.unwrap_or_else(defaults::default_dist_dir);

    match args.command {
        ServerSubcommand::Start => {
            // Options belong to `server`, so they go before the subcommand
            let status = daemon.spawn(&[
                "server".to_string(),
                format!("--dist-dir={}", dist_dir.display()),
                format!("--port={}", args.port),
                "run".to_string(),
                "--log-level=debug".to_string(),
            ])?;
            println!(
                "server started (pid {}, logs: {})",
                status.pid,
                status.log_path.display()
            );
        }
        ServerSubcommand::Status => match daemon.status()? {
            Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
            None => println!("server is not running"),
        },
        ServerSubcommand::Stop => {
            if daemon.stop()? {
                println!("server stopped");
            } else {
                println!("server is not running");
            }
        }
        ServerSubcommand::Run => run_foreground(&daemon, &dist_dir, args.port)?,
        ServerSubcommand::Logs(logs) => daemon.tail(logs.lines)?,
    }

    Ok(())
}

/// Supervise the index server subprocess in the foreground.
///
/// Registers the current process in the PID file so `status`/`stop` work
/// whether the server was started via `start` or directly via `run`, and
/// forwards termination signals to the subprocess.
fn run_foreground(daemon: &Daemon, dist_dir: &PathBuf, port: u16) -> Result<()> {
    std::fs::create_dir_all(dist_dir)
        .with_context(|| format!("failed to create dist directory {}", dist_dir.display()))?;

    let flag = ShutdownFlag::new();
    install_signal_handlers(&flag);
    daemon.write_own_pid()?;

    log::info!(
        "Serving index from {} on port {}",
        dist_dir.display(),
        port
    );

    // -a . -P . disables authentication for all actions (local index)
    let mut child = Command::new("pypi-server")
        .arg("run")
        .arg(dist_dir)
        .arg(format!("-p{}", port))
        .args(["-a", ".", "-P", ".", "-v"])
        .stdin(Stdio::null())
        .spawn()
        .context("failed to spawn pypi-server (is it installed?)")?;

    let exit = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if flag.is_set() {
            break None;
        }
        std::thread::sleep(Duration::from_millis(500));
    };

    let result = match exit {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(anyhow::anyhow!("pypi-server exited with {}", status)),
        None => {
            // Graceful shutdown requested: take the subprocess down with us
            child.kill().ok();
            child.wait().ok();
            Ok(())
        }
    };

    daemon.clear_own_pid()?;
    result
}
