//! # Daemon Process Lifecycle
//!
//! Background lifecycle management for the server and watcher subcommands:
//! spawn a detached child, record its PID in a file under the run directory,
//! and drive status/stop/logs off that file.
//!
//! A PID file plus a `kill(pid, 0)` liveness probe replaces scanning the
//! host's process list: the probe answers "is *our* process alive" without
//! touching anything else on the machine, and a stale file left by a crash
//! is detected and cleaned up on the next status check.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::error::{Error, Result};

/// Status of a managed daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub name: String,
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Handle on one named daemon (server or watcher).
#[derive(Debug, Clone)]
pub struct Daemon {
    name: String,
    run_dir: PathBuf,
}

impl Daemon {
    /// Create a handle for the daemon `name`, keeping its PID and log files
    /// under `run_dir`.
    pub fn new(name: impl Into<String>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            run_dir: run_dir.into(),
        }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.pid", self.name))
    }

    pub fn log_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.log", self.name))
    }

    /// Spawn the current executable with `args` as a detached background
    /// process, redirecting its output to the daemon log file.
    ///
    /// Refuses to start when an instance is already running.
    pub fn spawn(&self, args: &[String]) -> Result<DaemonStatus> {
        if let Some(status) = self.status()? {
            return Err(Error::Process {
                message: format!(
                    "{} is already running (pid {})",
                    self.name, status.pid
                ),
            });
        }

        fs::create_dir_all(&self.run_dir)?;
        let log = fs::File::create(self.log_path())?;
        let log_err = log.try_clone()?;

        let exe = std::env::current_exe()?;
        let child = Command::new(exe)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| Error::Process {
                message: format!("failed to spawn {}: {}", self.name, e),
            })?;

        let pid = child.id();
        fs::write(self.pid_path(), pid.to_string())?;
        log::info!("{}: started (pid {}, logs: {})", self.name, pid, self.log_path().display());

        Ok(DaemonStatus {
            name: self.name.clone(),
            pid,
            log_path: self.log_path(),
        })
    }

    /// Status of the daemon, or `None` when it is not running.
    ///
    /// A PID file pointing at a dead process is removed (stale file from a
    /// crash or an unclean shutdown) and reported as not running.
    pub fn status(&self) -> Result<Option<DaemonStatus>> {
        let pid = match fs::read_to_string(self.pid_path()) {
            Ok(content) => match content.trim().parse::<u32>() {
                Ok(pid) => pid,
                Err(_) => {
                    fs::remove_file(self.pid_path())?;
                    return Ok(None);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if process_alive(pid) {
            Ok(Some(DaemonStatus {
                name: self.name.clone(),
                pid,
                log_path: self.log_path(),
            }))
        } else {
            fs::remove_file(self.pid_path())?;
            Ok(None)
        }
    }

    /// Stop the daemon with a termination signal.
    ///
    /// Returns `false` when it was not running (not an error).
    pub fn stop(&self) -> Result<bool> {
        let Some(status) = self.status()? else {
            return Ok(false);
        };
        terminate(status.pid)?;
        fs::remove_file(self.pid_path())?;
        log::info!("{}: stopped (pid {})", self.name, status.pid);
        Ok(true)
    }

    /// Print the last `lines` lines of the daemon log to stdout.
    pub fn tail(&self, lines: usize) -> Result<()> {
        let file = match fs::File::open(self.log_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("(no log file at {})", self.log_path().display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut last: std::collections::VecDeque<String> =
            std::collections::VecDeque::with_capacity(lines);
        for line in BufReader::new(file).lines() {
            let line = line?;
            if last.len() == lines {
                last.pop_front();
            }
            last.push_back(line);
        }
        for line in last {
            println!("{}", line);
        }
        Ok(())
    }

    /// Record the current process in the PID file.
    ///
    /// Used by foreground `run` commands started directly (not via `start`)
    /// so that `status`/`stop` still see them.
    pub fn write_own_pid(&self) -> Result<()> {
        fs::create_dir_all(&self.run_dir)?;
        fs::write(self.pid_path(), std::process::id().to_string())?;
        Ok(())
    }

    /// Remove the PID file if it records the current process.
    pub fn clear_own_pid(&self) -> Result<()> {
        if let Ok(content) = fs::read_to_string(self.pid_path()) {
            if content.trim() == std::process::id().to_string() {
                fs::remove_file(self.pid_path())?;
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Signal 0 probes existence without delivering anything
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        return Err(Error::Process {
            message: format!("failed to signal pid {}", pid),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    Err(Error::Process {
        message: format!("stopping pid {} is unsupported on this platform", pid),
    })
}
