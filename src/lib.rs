//! # Insiders Mirror Library
//!
//! This library implements the machinery behind the `insiders-mirror`
//! command-line tool: it keeps self-hosted "insiders" builds of tracked
//! repositories published on a private package index.
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: a flat JSON mapping of tracked
//!   repositories (`namespace/project`) to the package names they publish as.
//! - **Repository Cache (`cache`, `git`)**: on-disk clones of the tracked
//!   repositories, updated in place and built from on each pass.
//! - **Index Client (`index`)**: version queries against the package index's
//!   simple API and idempotent artifact uploads.
//! - **Reconciliation (`reconcile`, `version`)**: the decision loop that
//!   compares the latest release tag against the latest published version
//!   and builds and uploads only when something new appeared.
//! - **Watcher (`watcher`)**: a sleep-loop that reconciles on an interval
//!   with cooperative, signal-driven shutdown.
//! - **Process lifecycle (`process`)**: PID-file management for running the
//!   watcher and index server in the background.
//!
//! ## Execution Flow
//!
//! A reconciliation pass for one repository:
//!
//! 1. Clone the repository if absent, otherwise re-resolve the default
//!    branch and pull.
//! 2. Read the latest tag; none means nothing to publish.
//! 3. Compare its normalized version against the index's latest.
//! 4. When they differ (and the tag isn't an already-mirrored older
//!    release), checkout the tag, build distributions and upload them.
//!
//! Every step is synchronous and sequential; failures in one repository are
//! contained by the calling loop and never abort the other repositories.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod index;
pub mod process;
pub mod reconcile;
pub mod version;
pub mod watcher;
