//! # Repository Configuration
//!
//! This module manages the flat JSON file mapping tracked repositories to the
//! package names they publish as:
//!
//! ```json
//! {
//!   "namespace/project": "package-name"
//! }
//! ```
//!
//! Semantics:
//! - Loading a non-existent file yields an empty mapping, not an error.
//! - Saving is a full pretty-printed overwrite; the parent directory is
//!   created on demand.
//! - There is no file locking. Concurrent writers are unsupported and the
//!   last full write wins (single-process assumption).
//!
//! The mapping is a `BTreeMap` so that saved output and `repos list` output
//! are deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The repository → package mapping.
pub type RepositoryMap = BTreeMap<String, String>;

/// Handle on the repositories configuration file.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    conf_path: PathBuf,
}

impl RepositoryConfig {
    /// Create a handle for the configuration file at `conf_path`.
    ///
    /// The file itself is not touched until the first load or save.
    pub fn new(conf_path: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
        }
    }

    /// Path of the underlying configuration file.
    pub fn path(&self) -> &Path {
        &self.conf_path
    }

    /// Load the configured repositories.
    ///
    /// A missing file is treated as an empty configuration. A file that
    /// exists but cannot be read or parsed is a [`Error::Config`].
    pub fn load(&self) -> Result<RepositoryMap> {
        let content = match fs::read_to_string(&self.conf_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RepositoryMap::new());
            }
            Err(e) => {
                return Err(Error::Config {
                    path: self.conf_path.display().to_string(),
                    message: e.to_string(),
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| Error::Config {
            path: self.conf_path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save the given repositories, overwriting the whole file.
    pub fn save(&self, repos: &RepositoryMap) -> Result<()> {
        if let Some(parent) = self.conf_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(repos)?;
        fs::write(&self.conf_path, content)?;
        Ok(())
    }

    /// Add the given repositories and return the resulting configuration.
    ///
    /// Existing entries for the same repository are overwritten.
    pub fn add(&self, entries: &RepositoryMap) -> Result<RepositoryMap> {
        let mut repos = self.load()?;
        for (repo, package) in entries {
            repos.insert(repo.clone(), package.clone());
        }
        self.save(&repos)?;
        Ok(repos)
    }

    /// Remove the given repositories and return the resulting configuration.
    ///
    /// Removing a repository that is not configured is a no-op.
    pub fn remove<I, S>(&self, repo_ids: I) -> Result<RepositoryMap>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut repos = self.load()?;
        for repo in repo_ids {
            repos.remove(repo.as_ref());
        }
        self.save(&repos)?;
        Ok(repos)
    }
}
