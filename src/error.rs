//! # Error Handling
//!
//! Centralized error type for `insiders-mirror`, built with `thiserror`.
//!
//! The taxonomy follows the failure boundaries of the reconciliation loop:
//!
//! - **`Config`**: the repositories file is unreadable or corrupt. Fatal for
//!   the whole invocation.
//! - **`GitClone` / `GitCommand`**: a git subprocess failed. Fatal for the
//!   current repository's reconciliation pass only; a multi-repository run
//!   contains these at the per-repository boundary and keeps going.
//! - **`Build`**: the build backend failed for a repository.
//! - **`Upload`**: the index rejected an upload batch. Retrying means
//!   re-running the whole reconciliation later (uploads skip existing files,
//!   so retries are safe).
//! - **`Index`**: a read-side index query failed (network, bad response).
//!
//! Note what is *not* here: "repository has no tags" and "package was never
//! published" are normal decision branches, and a malformed version string is
//! recovered internally by building anyway. None of those surface as errors.

use thiserror::Error;

/// Main error type for insiders-mirror operations
#[derive(Error, Debug)]
pub enum Error {
    /// The repositories configuration file could not be read or parsed.
    #[error("Configuration error for {path}: {message}")]
    Config { path: String, message: String },

    /// An error occurred while cloning a repository.
    ///
    /// Includes the repository identifier, error message, and an optional
    /// hint for resolution (e.g. missing SSH credentials).
    #[error("Git clone error for {repo}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        repo: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// An error occurred while executing a git command in a cached clone.
    #[error("Git command failed for {repo}: git {command} - {stderr}")]
    GitCommand {
        repo: String,
        command: String,
        stderr: String,
    },

    /// The build backend failed to produce distributions.
    #[error("Build error for {repo}: {message}")]
    Build { repo: String, message: String },

    /// Distribution upload to the index failed.
    #[error("Upload error: {message}")]
    Upload { message: String },

    /// A read-side index query failed.
    #[error("Index query error for {url}: {message}")]
    Index { url: String, message: String },

    /// A daemon lifecycle operation failed (PID file, spawn, signal).
    #[error("Process lifecycle error: {message}")]
    Process { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let error = Error::Config {
            path: "/tmp/repos.json".to_string(),
            message: "expected a JSON object".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("/tmp/repos.json"));
        assert!(display.contains("expected a JSON object"));
    }

    #[test]
    fn test_error_display_git_clone() {
        let error = Error::GitClone {
            repo: "ns/proj".to_string(),
            message: "Authentication failed".to_string(),
            hint: None,
        };
        let display = format!("{}", error);
        assert!(display.contains("Git clone error"));
        assert!(display.contains("ns/proj"));
        assert!(display.contains("Authentication failed"));
    }

    #[test]
    fn test_error_display_git_clone_with_hint() {
        let error = Error::GitClone {
            repo: "ns/proj".to_string(),
            message: "Permission denied".to_string(),
            hint: Some("Check SSH keys".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("hint:"));
        assert!(display.contains("Check SSH keys"));
    }

    #[test]
    fn test_error_display_git_command() {
        let error = Error::GitCommand {
            repo: "ns/proj".to_string(),
            command: "pull".to_string(),
            stderr: "no tracking information".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Git command failed"));
        assert!(display.contains("git pull"));
        assert!(display.contains("no tracking information"));
    }

    #[test]
    fn test_error_display_build() {
        let error = Error::Build {
            repo: "ns/proj".to_string(),
            message: "backend exited with status 1".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Build error"));
        assert!(display.contains("ns/proj"));
    }

    #[test]
    fn test_error_display_upload() {
        let error = Error::Upload {
            message: "connection refused".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Upload error"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_error_display_index() {
        let error = Error::Index {
            url: "http://localhost:31411".to_string(),
            message: "timed out".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Index query error"));
        assert!(display.contains("http://localhost:31411"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{unclosed").unwrap_err();
        let error: Error = json_error.into();
        let display = format!("{}", error);
        assert!(display.contains("JSON error"));
    }
}
