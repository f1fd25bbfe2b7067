//! Low-level git subprocess helpers.
//!
//! This uses the system git command, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Clone `git@github.com:<repo>` into `target_dir`.
pub fn clone(repo: &str, target_dir: &Path) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let output = Command::new("git")
        .arg("clone")
        .arg(format!("git@github.com:{}", repo))
        .arg(target_dir)
        .output()
        .map_err(|e| Error::GitClone {
            repo: repo.to_string(),
            message: e.to_string(),
            hint: None,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // Provide a helpful hint for common auth failures
        let hint = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            Some(
                "Make sure you have access to the repository: \
                SSH key added to ssh-agent, git credentials configured, \
                or a personal access token set up."
                    .to_string(),
            )
        } else {
            None
        };

        return Err(Error::GitClone {
            repo: repo.to_string(),
            message: stderr,
            hint,
        });
    }

    Ok(())
}

/// Run a git command inside an existing clone and return its stdout.
///
/// Non-zero exit is an [`Error::GitCommand`] carrying the captured stderr.
pub fn run(repo: &str, work_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(work_dir)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            repo: repo.to_string(),
            command: args.join(" "),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            repo: repo.to_string(),
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_reports_command_and_stderr() {
        let temp = TempDir::new().unwrap();
        // Not a git repository, so any git command fails with a clear stderr
        let result = run("ns/proj", temp.path(), &["status"]);
        match result {
            Err(Error::GitCommand { repo, command, .. }) => {
                assert_eq!(repo, "ns/proj");
                assert_eq!(command, "status");
            }
            other => panic!("expected GitCommand error, got {:?}", other),
        }
    }

    #[test]
    fn test_run_in_fresh_repository() {
        let temp = TempDir::new().unwrap();
        run("ns/proj", temp.path(), &["init"]).unwrap();
        let out = run("ns/proj", temp.path(), &["rev-parse", "--is-inside-work-tree"]).unwrap();
        assert_eq!(out.trim(), "true");
    }

    // Cloning requires network access and credentials, exercised only in
    // the feature-gated end-to-end suite.
}
