//! # Distribution Index Client
//!
//! Read and write access to the package index.
//!
//! Reads go through the index's `/simple/{package}/` listing: the page links
//! every uploaded artifact, and versions are recovered from the artifact
//! filenames (sdists and wheels). Pre-releases and yanked files are listed
//! like any other, so they are always included — mirroring must track the
//! newest insiders build, stable or not.
//!
//! Writes shell out to `twine upload --skip-existing`, which treats
//! already-present artifacts as success. That makes uploads idempotent and
//! safe to retry by simply re-running the reconciliation.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{Error, Result};
use crate::version::parse_loose;

/// Client for one package index.
#[derive(Debug, Clone)]
pub struct PackageIndex {
    index_url: String,
}

impl PackageIndex {
    /// Create a client for the index at `index_url`.
    ///
    /// The URL is validated up front so a typo fails the command immediately
    /// instead of surfacing later as a confusing connection error.
    pub fn new(index_url: &str) -> Result<Self> {
        url::Url::parse(index_url)?;
        let mut index_url = index_url.to_string();
        while index_url.ends_with('/') {
            index_url.pop();
        }
        Ok(Self { index_url })
    }

    /// The configured index base URL.
    pub fn url(&self) -> &str {
        &self.index_url
    }

    fn simple_page(&self, package: &str) -> Result<Option<String>> {
        let url = format!("{}/simple/{}/", self.index_url, package);
        match ureq::get(&url).call() {
            Ok(response) => {
                let body = response.into_string().map_err(|e| Error::Index {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
                Ok(Some(body))
            }
            // Unknown package: a normal branch, not an error
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(Error::Index {
                url,
                message: e.to_string(),
            }),
        }
    }

    /// All versions of a package known to the index, or `None` if the index
    /// does not know the package at all.
    pub fn versions(&self, package: &str) -> Result<Option<Vec<String>>> {
        let Some(body) = self.simple_page(package)? else {
            return Ok(None);
        };
        Ok(Some(versions_from_page(package, &body)))
    }

    /// Latest version of a package, or `None` if unpublished.
    pub fn latest_version(&self, package: &str) -> Result<Option<String>> {
        let Some(versions) = self.versions(package)? else {
            return Ok(None);
        };
        Ok(best_version(&versions))
    }

    /// Exact-version existence check, same inclusion rules as
    /// [`latest_version`](Self::latest_version).
    pub fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        match self.versions(package)? {
            Some(versions) => Ok(versions.iter().any(|v| v == version)),
            None => Ok(false),
        }
    }

    /// Upload a batch of distribution artifacts.
    ///
    /// Artifacts that already exist on the index are silently skipped.
    pub fn upload(&self, artifacts: &[PathBuf]) -> Result<()> {
        if artifacts.is_empty() {
            return Ok(());
        }

        let output = Command::new("twine")
            .args([
                "upload",
                "--non-interactive",
                "--skip-existing",
                "--disable-progress-bar",
                "--repository-url",
            ])
            .arg(&self.index_url)
            .args(artifacts)
            .env("TWINE_USERNAME", "")
            .env("TWINE_PASSWORD", "")
            .output()
            .map_err(|e| Error::Upload {
                message: e.to_string(),
            })?;

        log::debug!(
            "twine output:\n{}",
            String::from_utf8_lossy(&output.stdout)
        );

        if !output.status.success() {
            return Err(Error::Upload {
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }
}

/// Extract the set of published versions from a simple-API page.
fn versions_from_page(package: &str, body: &str) -> Vec<String> {
    let mut versions: Vec<String> = extract_filenames(body)
        .iter()
        .filter_map(|name| version_from_filename(package, name))
        .collect();
    versions.sort();
    versions.dedup();
    versions
}

/// Pull anchor texts (artifact filenames) out of a simple-API HTML page.
fn extract_filenames(body: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = body;
    while let Some(end) = rest.find("</a>") {
        let before = &rest[..end];
        if let Some(start) = before.rfind('>') {
            let text = before[start + 1..].trim();
            if !text.is_empty() {
                names.push(text.to_string());
            }
        }
        rest = &rest[end + 4..];
    }
    names
}

/// Normalize a distribution name for filename matching: lowercase with
/// `-`, `_` and `.` all treated as the same separator.
fn canonical_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

/// Recover the version encoded in an artifact filename, if the artifact
/// belongs to `package`.
///
/// Handles sdists (`pkg-1.0.0.tar.gz`, `pkg-1.0.0.zip`) and wheels
/// (`pkg-1.0.0-py3-none-any.whl`, where the version is the second
/// dash-separated field).
fn version_from_filename(package: &str, filename: &str) -> Option<String> {
    let (stem, is_wheel) = if let Some(stem) = filename.strip_suffix(".whl") {
        (stem, true)
    } else if let Some(stem) = filename.strip_suffix(".tar.gz") {
        (stem, false)
    } else if let Some(stem) = filename.strip_suffix(".zip") {
        (stem, false)
    } else {
        return None;
    };

    let wanted = canonical_name(package);
    // Find the separator that splits the distribution name from the version
    for (i, c) in stem.char_indices() {
        if (c == '-' || c == '_') && canonical_name(&stem[..i]) == wanted {
            let rest = &stem[i + 1..];
            let version = if is_wheel {
                rest.split('-').next()?
            } else {
                rest
            };
            if version.is_empty() {
                return None;
            }
            return Some(version.to_string());
        }
    }
    None
}

/// Best-match version among the published ones.
///
/// Prefers the semantically greatest parseable version; if nothing parses,
/// falls back to the lexicographically greatest string so an answer is still
/// produced.
fn best_version(versions: &[String]) -> Option<String> {
    versions
        .iter()
        .filter_map(|v| parse_loose(v).map(|parsed| (parsed, v)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v.clone())
        .or_else(|| versions.iter().max().cloned())
}
