//! # Update Command Implementation
//!
//! This module implements the `update` subcommand: one reconciliation pass
//! over all (or a selection of) tracked repositories.
//!
//! A failing repository does not abort the others; the command reports every
//! outcome and exits non-zero if any repository failed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use insiders_mirror::cache::RepositoryCache;
use insiders_mirror::config::RepositoryConfig;
use insiders_mirror::defaults;
use insiders_mirror::index::PackageIndex;
use insiders_mirror::reconcile::{update_repositories, Outcome};

/// Reconcile tracked repositories against the index once
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Repository configuration file path.
    #[arg(short = 'c', long, value_name = "FILE", env = "INSIDERS_MIRROR_CONF")]
    pub conf_path: Option<PathBuf>,

    /// Directory containing the repository clones.
    #[arg(short = 'r', long, value_name = "DIR", env = "INSIDERS_MIRROR_CACHE")]
    pub repo_dir: Option<PathBuf>,

    /// URL of the package index to query and upload to.
    #[arg(short = 'i', long, value_name = "URL", env = "INSIDERS_MIRROR_INDEX")]
    pub index_url: Option<String>,

    /// Repositories to update (default: all configured repositories).
    #[arg(value_name = "REPO")]
    pub repositories: Vec<String>,
}

/// Execute the `update` command.
pub fn execute(args: UpdateArgs) -> Result<()> {
    let conf_path = args.conf_path.unwrap_or_else(defaults::default_conf_path);
    let config = RepositoryConfig::new(&conf_path);
    let repos = config
        .load()
        .with_context(|| format!("failed to load config from {}", conf_path.display()))?;

    if repos.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }

    let cache = RepositoryCache::new(args.repo_dir.unwrap_or_else(defaults::default_repo_dir));
    let index_url = args.index_url.unwrap_or_else(defaults::default_index_url);
    let index =
        PackageIndex::new(&index_url).with_context(|| format!("invalid index URL {}", index_url))?;

    let summary = update_repositories(&cache, &index, &repos, &args.repositories);

    for (repo, outcome) in &summary.outcomes {
        match outcome {
            Outcome::NoTags => println!("{}: no tags, nothing to publish", repo),
            Outcome::UpToDate => println!("{}: up to date", repo),
            Outcome::AlreadyPublished { version } => {
                println!("{}: {} already on the index, skipped", repo, version)
            }
            Outcome::Published { version } => println!("{}: published {}", repo, version),
        }
    }
    for (repo, message) in &summary.failures {
        eprintln!("{}: FAILED: {}", repo, message);
    }

    if !summary.is_ok() {
        bail!("{} repositories failed to update", summary.failures.len());
    }
    Ok(())
}
