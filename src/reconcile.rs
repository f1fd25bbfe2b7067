//! # Update Reconciliation
//!
//! The core decision loop: for each tracked repository, bring the index's
//! published state in line with the repository's latest tagged release.
//!
//! ## Design
//!
//! The reconciler talks to its collaborators through two traits, [`CacheOps`]
//! and [`IndexOps`], implemented by [`RepositoryCache`] and [`PackageIndex`]
//! in the running application and by mocks in tests. This keeps the decision
//! logic testable without a git remote, a build backend, or a live index.
//!
//! ## Algorithm
//!
//! Per repository `(repo, package)`:
//!
//! 1. Clone if absent; otherwise re-resolve the upstream default branch and
//!    fast-forward pull.
//! 2. Read the latest reachable tag. No tags → nothing to publish yet.
//! 3. Read the latest published version (absent → treated as `0.0.0`).
//! 4. Normalize both sides. Equal → up to date.
//! 5. If the tag parses as *older* than the published version and its exact
//!    version already exists on the index, skip: the tag is behind the
//!    index's newest but already mirrored, and re-publishing a superseded
//!    version would be pure waste. If either side fails to parse, fail open:
//!    a false skip silently loses a release, while a false build is merely a
//!    redundant (idempotent) upload.
//! 6. Otherwise clear the previous build output, checkout the exact tag,
//!    build the distributions, and upload them.
//!
//! Running the loop twice with no upstream change performs a no-op pull and
//! then detects equal normalized versions: idempotent by construction.

use std::path::PathBuf;

use log::{info, warn};

use crate::cache::RepositoryCache;
use crate::config::RepositoryMap;
use crate::error::Result;
use crate::index::PackageIndex;
use crate::version::{normalize, parse_loose};

/// Cache-side operations the reconciler needs. Allows mocking in tests.
pub trait CacheOps {
    fn exists(&self, repo: &str) -> bool;
    fn clone_repo(&self, repo: &str) -> Result<PathBuf>;
    fn checkout_default_branch(&self, repo: &str) -> Result<()>;
    fn pull(&self, repo: &str) -> Result<()>;
    fn latest_tag(&self, repo: &str) -> Result<Option<String>>;
    fn checkout(&self, repo: &str, r#ref: &str) -> Result<()>;
    fn remove_dist(&self, repo: &str) -> Result<()>;
    fn build(&self, repo: &str) -> Result<Vec<PathBuf>>;
}

impl CacheOps for RepositoryCache {
    fn exists(&self, repo: &str) -> bool {
        RepositoryCache::exists(self, repo)
    }
    fn clone_repo(&self, repo: &str) -> Result<PathBuf> {
        RepositoryCache::clone_repo(self, repo)
    }
    fn checkout_default_branch(&self, repo: &str) -> Result<()> {
        RepositoryCache::checkout_default_branch(self, repo)
    }
    fn pull(&self, repo: &str) -> Result<()> {
        RepositoryCache::pull(self, repo)
    }
    fn latest_tag(&self, repo: &str) -> Result<Option<String>> {
        RepositoryCache::latest_tag(self, repo)
    }
    fn checkout(&self, repo: &str, r#ref: &str) -> Result<()> {
        RepositoryCache::checkout(self, repo, r#ref)
    }
    fn remove_dist(&self, repo: &str) -> Result<()> {
        RepositoryCache::remove_dist(self, repo)
    }
    fn build(&self, repo: &str) -> Result<Vec<PathBuf>> {
        RepositoryCache::build(self, repo)
    }
}

/// Index-side operations the reconciler needs. Allows mocking in tests.
pub trait IndexOps {
    fn latest_version(&self, package: &str) -> Result<Option<String>>;
    fn version_exists(&self, package: &str, version: &str) -> Result<bool>;
    fn upload(&self, artifacts: &[PathBuf]) -> Result<()>;
}

impl IndexOps for PackageIndex {
    fn latest_version(&self, package: &str) -> Result<Option<String>> {
        PackageIndex::latest_version(self, package)
    }
    fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        PackageIndex::version_exists(self, package, version)
    }
    fn upload(&self, artifacts: &[PathBuf]) -> Result<()> {
        PackageIndex::upload(self, artifacts)
    }
}

/// What a reconciliation pass decided for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The repository has no tags yet; nothing to publish.
    NoTags,
    /// The latest tag is already the latest published version.
    UpToDate,
    /// The latest tag is older than the published version but already exists
    /// on the index; re-publishing it would be redundant.
    AlreadyPublished { version: String },
    /// Distributions were built and uploaded for this normalized version.
    Published { version: String },
}

/// Reconcile a single repository against the index.
///
/// Failures of any underlying git, build, or upload step propagate; callers
/// running multiple repositories contain them per repository.
pub fn reconcile_repo(
    cache: &dyn CacheOps,
    index: &dyn IndexOps,
    repo: &str,
    package: &str,
) -> Result<Outcome> {
    if !cache.exists(repo) {
        info!("{}: Cloning (git clone)", repo);
        cache.clone_repo(repo)?;
    } else {
        info!("{}: Updating (git pull)", repo);
        cache.checkout_default_branch(repo)?;
        cache.pull(repo)?;
    }

    let Some(latest_tag) = cache.latest_tag(repo)? else {
        info!("{}: No tags found", repo);
        return Ok(Outcome::NoTags);
    };
    info!("{}: Latest tag is {}", repo, latest_tag);

    let latest_version = index.latest_version(package)?;
    if let Some(version) = &latest_version {
        info!("{}: Latest published version is {}", repo, version);
    }

    let normal_tag = normalize(&latest_tag);
    let normal_version = normalize(latest_version.as_deref().unwrap_or("0.0.0"));

    if latest_version.is_some() && normal_tag == normal_version {
        return Ok(Outcome::UpToDate);
    }

    // Ordering check is advisory only: an unparseable side means we build
    // anyway rather than risk silently losing a release.
    if let (Some(tag_ver), Some(pub_ver)) = (parse_loose(&normal_tag), parse_loose(&normal_version))
    {
        if tag_ver < pub_ver {
            warn!(
                "{}: Latest tag {} is older than latest published version {}",
                repo, latest_tag, normal_version
            );
            if index.version_exists(package, &normal_tag)? {
                return Ok(Outcome::AlreadyPublished {
                    version: normal_tag,
                });
            }
        }
    }

    info!("{}: Building distributions", repo);
    cache.remove_dist(repo)?;
    cache.checkout(repo, &latest_tag)?;
    let artifacts = cache.build(repo)?;

    info!("{}: Uploading distributions", repo);
    index.upload(&artifacts)?;

    info!("{}: Built and published version {}", repo, normal_tag);
    Ok(Outcome::Published {
        version: normal_tag,
    })
}

/// Result of reconciling a set of repositories.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Outcome per successfully reconciled repository.
    pub outcomes: Vec<(String, Outcome)>,
    /// Repositories whose pass failed, with the error message.
    pub failures: Vec<(String, String)>,
}

impl UpdateSummary {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reconcile every repository in `repos` (optionally restricted to
/// `selected`) sequentially, one at a time.
///
/// A failure in one repository is contained and logged; the remaining
/// repositories still run. The summary reports both outcomes and failures.
pub fn update_repositories(
    cache: &dyn CacheOps,
    index: &dyn IndexOps,
    repos: &RepositoryMap,
    selected: &[String],
) -> UpdateSummary {
    let mut summary = UpdateSummary::default();

    for (repo, package) in repos {
        if !selected.is_empty() && !selected.contains(repo) {
            continue;
        }
        match reconcile_repo(cache, index, repo, package) {
            Ok(outcome) => summary.outcomes.push((repo.clone(), outcome)),
            Err(e) => {
                log::error!("{}: Reconciliation failed: {}", repo, e);
                summary.failures.push((repo.clone(), e.to_string()));
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;

    /// Mock cache tracking which operations ran.
    #[derive(Default)]
    struct MockCache {
        exists: bool,
        latest_tag: Option<String>,
        fail_pull: bool,
        calls: RefCell<Vec<String>>,
    }

    impl MockCache {
        fn with_tag(tag: &str) -> Self {
            Self {
                exists: true,
                latest_tag: Some(tag.to_string()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: &str) {
            self.calls.borrow_mut().push(call.to_string());
        }
    }

    impl CacheOps for MockCache {
        fn exists(&self, _repo: &str) -> bool {
            self.exists
        }
        fn clone_repo(&self, repo: &str) -> Result<PathBuf> {
            self.record("clone");
            Ok(PathBuf::from(format!("/cache/{}", repo)))
        }
        fn checkout_default_branch(&self, _repo: &str) -> Result<()> {
            self.record("checkout_default_branch");
            Ok(())
        }
        fn pull(&self, repo: &str) -> Result<()> {
            self.record("pull");
            if self.fail_pull {
                return Err(Error::GitCommand {
                    repo: repo.to_string(),
                    command: "pull".to_string(),
                    stderr: "simulated failure".to_string(),
                });
            }
            Ok(())
        }
        fn latest_tag(&self, _repo: &str) -> Result<Option<String>> {
            Ok(self.latest_tag.clone())
        }
        fn checkout(&self, _repo: &str, r#ref: &str) -> Result<()> {
            self.record(&format!("checkout {}", r#ref));
            Ok(())
        }
        fn remove_dist(&self, _repo: &str) -> Result<()> {
            self.record("remove_dist");
            Ok(())
        }
        fn build(&self, _repo: &str) -> Result<Vec<PathBuf>> {
            self.record("build");
            Ok(vec![
                PathBuf::from("dist/proj-2.0.0.tar.gz"),
                PathBuf::from("dist/proj-2.0.0-py3-none-any.whl"),
            ])
        }
    }

    /// Mock index with a fixed view of published versions.
    #[derive(Default)]
    struct MockIndex {
        latest: RefCell<Option<String>>,
        existing: Vec<String>,
        uploads: RefCell<Vec<Vec<PathBuf>>>,
    }

    impl MockIndex {
        fn with_latest(version: &str) -> Self {
            Self {
                latest: RefCell::new(Some(version.to_string())),
                ..Self::default()
            }
        }

        fn upload_count(&self) -> usize {
            self.uploads.borrow().len()
        }
    }

    impl IndexOps for MockIndex {
        fn latest_version(&self, _package: &str) -> Result<Option<String>> {
            Ok(self.latest.borrow().clone())
        }
        fn version_exists(&self, _package: &str, version: &str) -> Result<bool> {
            Ok(self.existing.iter().any(|v| v == version))
        }
        fn upload(&self, artifacts: &[PathBuf]) -> Result<()> {
            self.uploads.borrow_mut().push(artifacts.to_vec());
            // A real index would now list the uploaded version as latest
            *self.latest.borrow_mut() = Some("2.0.0".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_up_to_date_is_noop() {
        let cache = MockCache::with_tag("v1.2.3");
        let index = MockIndex::with_latest("1.2.3");

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(outcome, Outcome::UpToDate);
        assert!(!cache.calls().contains(&"build".to_string()));
        assert_eq!(index.upload_count(), 0);
    }

    #[test]
    fn test_up_to_date_across_normalization() {
        // Tag carries a v prefix and dash separators, index stores dots
        let cache = MockCache::with_tag("v1.2.3-rc1+build");
        let index = MockIndex::with_latest("1.2.3.rc1.build");

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(outcome, Outcome::UpToDate);
    }

    #[test]
    fn test_no_tags_skips_without_error() {
        let cache = MockCache {
            exists: true,
            latest_tag: None,
            ..MockCache::default()
        };
        let index = MockIndex::default();

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(outcome, Outcome::NoTags);
        assert_eq!(index.upload_count(), 0);
    }

    #[test]
    fn test_unpublished_package_builds_and_uploads() {
        let cache = MockCache {
            exists: false,
            latest_tag: Some("v2.0.0".to_string()),
            ..MockCache::default()
        };
        let index = MockIndex::default();

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(
            outcome,
            Outcome::Published {
                version: "2.0.0".to_string()
            }
        );
        assert_eq!(
            cache.calls(),
            vec!["clone", "remove_dist", "checkout v2.0.0", "build"]
        );
        assert_eq!(index.upload_count(), 1);
        assert_eq!(index.uploads.borrow()[0].len(), 2);
    }

    #[test]
    fn test_existing_clone_pulls_default_branch_first() {
        let cache = MockCache::with_tag("v2.0.0");
        let index = MockIndex::default();

        reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(cache.calls()[..2], ["checkout_default_branch", "pull"]);
    }

    #[test]
    fn test_older_tag_already_on_index_is_skipped() {
        // Tag 1.0.0 is behind published 2.0.0 but still present on the index
        let cache = MockCache::with_tag("v1.0.0");
        let index = MockIndex {
            latest: RefCell::new(Some("2.0.0".to_string())),
            existing: vec!["1.0.0".to_string()],
            ..MockIndex::default()
        };

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(
            outcome,
            Outcome::AlreadyPublished {
                version: "1.0.0".to_string()
            }
        );
        assert!(!cache.calls().contains(&"build".to_string()));
        assert_eq!(index.upload_count(), 0);
    }

    #[test]
    fn test_older_tag_missing_from_index_is_republished() {
        let cache = MockCache::with_tag("v1.0.0");
        let index = MockIndex::with_latest("2.0.0");

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert!(matches!(outcome, Outcome::Published { .. }));
    }

    #[test]
    fn test_unparseable_tag_fails_open_to_build() {
        let cache = MockCache::with_tag("not-a-version");
        let index = MockIndex::with_latest("1.0.0");

        let outcome = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert!(matches!(outcome, Outcome::Published { .. }));
        assert_eq!(index.upload_count(), 1);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let cache = MockCache::with_tag("v2.0.0");
        let index = MockIndex::default();

        let first = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert!(matches!(first, Outcome::Published { .. }));
        assert_eq!(index.upload_count(), 1);

        // The mock index now reports 2.0.0 as latest: nothing further happens
        let second = reconcile_repo(&cache, &index, "ns/proj", "proj").unwrap();
        assert_eq!(second, Outcome::UpToDate);
        assert_eq!(index.upload_count(), 1);
    }

    #[test]
    fn test_update_repositories_contains_per_repo_failures() {
        let cache = MockCache {
            exists: true,
            latest_tag: Some("v1.0.0".to_string()),
            fail_pull: true,
            ..MockCache::default()
        };
        let index = MockIndex::default();

        let repos: RepositoryMap = [
            ("a/one".to_string(), "one".to_string()),
            ("b/two".to_string(), "two".to_string()),
        ]
        .into_iter()
        .collect();

        let summary = update_repositories(&cache, &index, &repos, &[]);
        // Both repositories were attempted despite the first failing
        assert_eq!(summary.failures.len(), 2);
        assert!(!summary.is_ok());
    }

    #[test]
    fn test_update_repositories_honors_selection() {
        let cache = MockCache::with_tag("v1.0.0");
        let index = MockIndex::with_latest("1.0.0");

        let repos: RepositoryMap = [
            ("a/one".to_string(), "one".to_string()),
            ("b/two".to_string(), "two".to_string()),
        ]
        .into_iter()
        .collect();

        let summary = update_repositories(&cache, &index, &repos, &["a/one".to_string()]);
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].0, "a/one");
    }
}
