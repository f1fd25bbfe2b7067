//! Default values for insiders-mirror configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

const APP_NAME: &str = "insiders-mirror";

/// Default port for the local package index server.
pub const DEFAULT_PORT: u16 = 31411;

/// Default time to sleep between watcher cycles, in seconds.
pub const DEFAULT_WATCHER_SLEEP: u64 = 30 * 60;

/// Returns the default index URL, pointing at the local server.
pub fn default_index_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}

/// Returns the default path of the repositories configuration file.
///
/// Uses the platform-appropriate config directory:
/// - Linux: `~/.config/insiders-mirror/repos.json` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/insiders-mirror/repos.json`
///
/// Can be overridden by the `-c/--conf-path` CLI flag or the
/// `INSIDERS_MIRROR_CONF` environment variable.
pub fn default_conf_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".insiders-mirror"))
        .join(APP_NAME)
        .join("repos.json")
}

/// Returns the default root directory for repository clones.
///
/// Falls back to `.insiders-mirror-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// Can be overridden by the `--repo-dir` CLI flag or the
/// `INSIDERS_MIRROR_CACHE` environment variable.
pub fn default_repo_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".insiders-mirror-cache"))
        .join(APP_NAME)
}

/// Returns the default directory the index server serves distributions from.
pub fn default_dist_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".insiders-mirror-data"))
        .join(APP_NAME)
}

/// Returns the directory holding PID files and daemon logs.
///
/// Prefers the platform state directory (`~/.local/state` on Linux) and
/// falls back to the data directory on platforms without one.
pub fn default_run_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| {
            dirs::data_dir().unwrap_or_else(|| PathBuf::from(".insiders-mirror-data"))
        })
        .join(APP_NAME)
        .join("run")
}
