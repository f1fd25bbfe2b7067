//! # Repository Cache
//!
//! On-disk management of the tracked repository clones. Each configured
//! repository `namespace/project` is cloned under
//! `<cache_dir>/namespace/project` and updated in place on every
//! reconciliation pass.
//!
//! All mutations shell out to the system `git` client (see [`crate::git`]);
//! building distributions shells out to the build backend. Both are external
//! collaborators by design: any non-zero exit is fatal for the current
//! repository's pass and propagates to the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::git;

/// A cache of local clones for the configured repositories.
#[derive(Debug, Clone)]
pub struct RepositoryCache {
    cache_dir: PathBuf,
}

impl RepositoryCache {
    /// Create a cache rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory of a repository's clone (whether or not it exists yet).
    pub fn repo_path(&self, repo: &str) -> PathBuf {
        self.cache_dir.join(repo)
    }

    /// Check whether a repository clone already exists.
    pub fn exists(&self, repo: &str) -> bool {
        self.repo_path(repo).exists()
    }

    /// Clone a repository into the cache and return its path.
    pub fn clone_repo(&self, repo: &str) -> Result<PathBuf> {
        let path = self.repo_path(repo);
        git::clone(repo, &path)?;
        Ok(path)
    }

    /// Checkout an exact tag or branch.
    pub fn checkout(&self, repo: &str, r#ref: &str) -> Result<()> {
        git::run(repo, &self.repo_path(repo), &["checkout", r#ref])?;
        Ok(())
    }

    /// Re-resolve the upstream default branch and check it out.
    ///
    /// The upstream default branch can be renamed over time; this re-detects
    /// it opportunistically on every non-initial update rather than as a
    /// one-time migration.
    pub fn checkout_default_branch(&self, repo: &str) -> Result<()> {
        let path = self.repo_path(repo);
        git::run(repo, &path, &["remote", "set-head", "origin", "--auto"])?;
        let head = git::run(repo, &path, &["symbolic-ref", "refs/remotes/origin/HEAD"])?;
        // refs/remotes/origin/<branch>
        let branch = head
            .trim()
            .rsplit('/')
            .next()
            .ok_or_else(|| Error::GitCommand {
                repo: repo.to_string(),
                command: "symbolic-ref refs/remotes/origin/HEAD".to_string(),
                stderr: format!("unexpected symbolic ref output: {}", head.trim()),
            })?
            .to_string();
        self.checkout(repo, &branch)
    }

    /// Fast-forward the current branch.
    pub fn pull(&self, repo: &str) -> Result<()> {
        git::run(repo, &self.repo_path(repo), &["pull"])?;
        Ok(())
    }

    /// Most recent tag reachable from the current history.
    ///
    /// Uses `git describe --tags --abbrev=0` (exact tag name, no distance
    /// suffix). Returns `None` when the repository has no tags, which is a
    /// normal branch, not an error.
    pub fn latest_tag(&self, repo: &str) -> Result<Option<String>> {
        match git::run(repo, &self.repo_path(repo), &["describe", "--tags", "--abbrev=0"]) {
            Ok(out) => {
                let tag = out.trim().to_string();
                Ok(if tag.is_empty() { None } else { Some(tag) })
            }
            Err(Error::GitCommand { stderr, .. })
                if stderr.contains("cannot describe")
                    || stderr.contains("No names found")
                    // empty repository: no commits implies no tags
                    || stderr.contains("bad revision") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a repository clone entirely. Tolerant of absent directories.
    pub fn remove(&self, repo: &str) -> Result<()> {
        let path = self.repo_path(repo);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the `dist` output directory of a repository, guaranteeing the
    /// next build starts clean. Tolerant of absent directories.
    pub fn remove_dist(&self, repo: &str) -> Result<()> {
        let dist = self.repo_path(repo).join("dist");
        match fs::remove_dir_all(&dist) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Build source and binary distributions into the repository's `dist`
    /// directory and return the resulting artifact paths.
    ///
    /// The build backend is invoked as a subprocess (`python -m build`);
    /// its output order in `dist` carries no meaning.
    pub fn build(&self, repo: &str) -> Result<Vec<PathBuf>> {
        let path = self.repo_path(repo);
        let dist = path.join("dist");

        let output = Command::new("python3")
            .args(["-m", "build", "--sdist", "--wheel", "--outdir"])
            .arg(&dist)
            .arg(&path)
            .output()
            .map_err(|e| Error::Build {
                repo: repo.to_string(),
                message: e.to_string(),
            })?;

        log::debug!(
            "{}: build backend output:\n{}",
            repo,
            String::from_utf8_lossy(&output.stdout)
        );

        if !output.status.success() {
            return Err(Error::Build {
                repo: repo.to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        collect_artifacts(&dist)
    }
}

fn collect_artifacts(dist: &Path) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dist)? {
        let entry = entry?;
        if entry.path().is_file() {
            artifacts.push(entry.path());
        }
    }
    Ok(artifacts)
}
