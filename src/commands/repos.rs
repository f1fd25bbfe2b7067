//! # Repos Command Implementation
//!
//! This module implements the `repos` subcommand, which manages the set of
//! tracked repositories in the configuration file.
//!
//! ## Subcommands
//!
//! - **`add`**: Track one or more `NAMESPACE/PROJECT:PACKAGE` pairs.
//! - **`list`**: Print the tracked repositories as `repo: package` lines.
//! - **`remove`**: Stop tracking repositories and delete their cached clones.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use insiders_mirror::cache::RepositoryCache;
use insiders_mirror::config::{RepositoryConfig, RepositoryMap};
use insiders_mirror::defaults;

/// Manage the tracked repositories
#[derive(Args, Debug)]
pub struct ReposArgs {
    /// Repository configuration file path.
    #[arg(short = 'c', long, value_name = "FILE", env = "INSIDERS_MIRROR_CONF")]
    pub conf_path: Option<PathBuf>,

    /// Directory containing the repository clones.
    #[arg(short = 'r', long, value_name = "DIR", env = "INSIDERS_MIRROR_CACHE")]
    pub repo_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: ReposSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ReposSubcommand {
    /// Track repositories, given as NAMESPACE/PROJECT:PACKAGE pairs
    Add(AddArgs),
    /// List the tracked repositories
    List,
    /// Stop tracking repositories and delete their cached clones
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repositories to add, as NAMESPACE/PROJECT:PACKAGE
    #[arg(required = true, value_name = "REPO:PACKAGE", value_parser = parse_repo_package)]
    pub repositories: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Repositories to remove, as NAMESPACE/PROJECT
    #[arg(required = true, value_name = "REPO")]
    pub repositories: Vec<String>,
}

fn parse_repo_package(arg: &str) -> Result<(String, String), String> {
    match arg.split_once(':') {
        Some((repo, package)) if !repo.is_empty() && !package.is_empty() => {
            Ok((repo.to_string(), package.to_string()))
        }
        _ => Err("repositories must be of the form NAMESPACE/PROJECT:PACKAGE".to_string()),
    }
}

/// Execute the `repos` command.
pub fn execute(args: ReposArgs) -> Result<()> {
    let conf_path = args.conf_path.unwrap_or_else(defaults::default_conf_path);
    let config = RepositoryConfig::new(conf_path);

    match args.command {
        ReposSubcommand::Add(add) => {
            let entries: RepositoryMap = add.repositories.into_iter().collect();
            config.add(&entries)?;
        }
        ReposSubcommand::List => {
            for (repo, package) in config.load()? {
                println!("{}: {}", repo, package);
            }
        }
        ReposSubcommand::Remove(remove) => {
            config.remove(&remove.repositories)?;
            let repo_dir = args.repo_dir.unwrap_or_else(defaults::default_repo_dir);
            let cache = RepositoryCache::new(repo_dir);
            for repo in &remove.repositories {
                cache.remove(repo)?;
            }
        }
    }

    Ok(())
}
