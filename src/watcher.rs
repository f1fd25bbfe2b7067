//! # Repositories Watcher
//!
//! A single-process loop that reconciles every configured repository, sleeps
//! for a configured interval, and repeats until a termination signal arrives.
//!
//! Shutdown is a two-stage debounce built on an explicit, polled flag rather
//! than asynchronous interruption:
//!
//! - The first `SIGINT`/`SIGTERM` sets the flag. It is checked between
//!   repositories, at the top of each cycle, and inside the sleep (which
//!   dozes in short slices), so an in-progress reconciliation finishes
//!   cleanly and shutdown latency stays bounded by one repository's pass.
//! - A second signal while one is already pending forces immediate process
//!   exit from the handler itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::reconcile::{reconcile_repo, CacheOps, IndexOps};

/// Granularity of the interruptible sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(500);

/// Shared shutdown state: counts delivered termination signals.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    signals: Arc<AtomicUsize>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one termination signal was received.
    pub fn is_set(&self) -> bool {
        self.signals.load(Ordering::SeqCst) > 0
    }

    /// Record one termination signal; returns the new count.
    pub fn trip(&self) -> usize {
        self.signals.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sleep for `duration`, waking early when the flag gets set.
    pub fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.is_set() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

#[cfg(unix)]
mod signals {
    use super::ShutdownFlag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::sync::OnceLock;

    static SIGNALS: OnceLock<Arc<AtomicUsize>> = OnceLock::new();

    extern "C" fn handle_signal(_signum: libc::c_int) {
        if let Some(signals) = SIGNALS.get() {
            // Second delivery forces exit; only async-signal-safe calls here
            if signals.fetch_add(1, Ordering::SeqCst) + 1 >= 2 {
                unsafe { libc::_exit(130) };
            }
        }
    }

    /// Route `SIGINT` and `SIGTERM` into the given flag.
    ///
    /// Single-call contract: install once per process, before the loop
    /// starts. Subsequent calls keep the originally installed flag.
    pub fn install(flag: &ShutdownFlag) {
        SIGNALS.get_or_init(|| Arc::clone(&flag.signals));
        unsafe {
            libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
        }
    }
}

/// Install process signal handlers feeding `flag`.
pub fn install_signal_handlers(flag: &ShutdownFlag) {
    #[cfg(unix)]
    signals::install(flag);
    #[cfg(not(unix))]
    let _ = flag;
}

/// Run the watch loop until `flag` is set.
///
/// Each cycle reloads the configuration from disk and reconciles every
/// configured repository, one at a time. Per-repository errors are logged
/// and contained: a single bad cycle never terminates the watcher.
pub fn watch(
    config: &RepositoryConfig,
    cache: &dyn CacheOps,
    index: &dyn IndexOps,
    interval: Duration,
    flag: &ShutdownFlag,
) -> Result<()> {
    info!(
        "Watching {} (cycle interval: {}s)",
        config.path().display(),
        interval.as_secs()
    );

    loop {
        let repos = config.load()?;
        for (repo, package) in &repos {
            if flag.is_set() {
                break;
            }
            if let Err(e) = reconcile_repo(cache, index, repo, package) {
                error!("{}: Reconciliation failed: {}", repo, e);
            }
        }
        if flag.is_set() {
            info!("Termination signal received, stopping watcher");
            return Ok(());
        }
        flag.sleep(interval);
        if flag.is_set() {
            info!("Termination signal received, stopping watcher");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryMap;
    use crate::error::Result;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_flag_starts_unset() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_trip_sets_flag_and_counts() {
        let flag = ShutdownFlag::new();
        assert_eq!(flag.trip(), 1);
        assert!(flag.is_set());
        assert_eq!(flag.trip(), 2);
    }

    #[test]
    fn test_sleep_returns_early_when_flag_set() {
        let flag = ShutdownFlag::new();
        flag.trip();
        let start = Instant::now();
        flag.sleep(Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_wakes_on_signal_from_other_thread() {
        let flag = ShutdownFlag::new();
        let tripper = flag.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            tripper.trip();
        });
        let start = Instant::now();
        flag.sleep(Duration::from_secs(60));
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    /// Cache mock that trips the shutdown flag during the first pass,
    /// simulating a signal arriving mid-reconciliation.
    struct TrippingCache {
        flag: ShutdownFlag,
        passes: RefCell<usize>,
    }

    impl CacheOps for TrippingCache {
        fn exists(&self, _repo: &str) -> bool {
            true
        }
        fn clone_repo(&self, _repo: &str) -> Result<PathBuf> {
            unreachable!()
        }
        fn checkout_default_branch(&self, _repo: &str) -> Result<()> {
            Ok(())
        }
        fn pull(&self, _repo: &str) -> Result<()> {
            *self.passes.borrow_mut() += 1;
            self.flag.trip();
            Ok(())
        }
        fn latest_tag(&self, _repo: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn checkout(&self, _repo: &str, _ref: &str) -> Result<()> {
            Ok(())
        }
        fn remove_dist(&self, _repo: &str) -> Result<()> {
            Ok(())
        }
        fn build(&self, _repo: &str) -> Result<Vec<PathBuf>> {
            Ok(vec![])
        }
    }

    struct NullIndex;

    impl IndexOps for NullIndex {
        fn latest_version(&self, _package: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn version_exists(&self, _package: &str, _version: &str) -> Result<bool> {
            Ok(false)
        }
        fn upload(&self, _artifacts: &[PathBuf]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_watch_exits_after_signal_mid_cycle() {
        let temp = TempDir::new().unwrap();
        let config = RepositoryConfig::new(temp.path().join("repos.json"));
        let repos: RepositoryMap = [
            ("a/one".to_string(), "one".to_string()),
            ("b/two".to_string(), "two".to_string()),
        ]
        .into_iter()
        .collect();
        config.save(&repos).unwrap();

        let flag = ShutdownFlag::new();
        let cache = TrippingCache {
            flag: flag.clone(),
            passes: RefCell::new(0),
        };

        watch(
            &config,
            &cache,
            &NullIndex,
            Duration::from_secs(3600),
            &flag,
        )
        .unwrap();

        // The in-progress repository finished; the second never started
        assert_eq!(*cache.passes.borrow(), 1);
    }
}
