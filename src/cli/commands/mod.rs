//! Command implementations.
//!
//! Every command that touches bugs runs inside [`with_workspace`], which
//! opens the cache for the repository around the current directory and
//! closes it again on every exit path.

pub mod comment;
pub mod completions;
pub mod label;
pub mod ls;
pub mod new;
pub mod pull;
pub mod rebuild_cache;
pub mod remote;
pub mod show;
pub mod status;
pub mod title;
pub mod version;

use anyhow::{Context, Result};
use gitbug_lib::{CacheOptions, RepoCache, Repository};
use serde::Serialize;

use crate::config::{self, Config};
use crate::storage::GitRepository;

/// An open cache plus the configuration it was opened with.
pub struct Workspace {
    pub cache: RepoCache<GitRepository>,
    pub config: Config,
}

impl Workspace {
    /// Discover the repository from the current directory and open its cache.
    ///
    /// # Errors
    ///
    /// Returns an error if no git repository is found, the configuration is
    /// malformed, or another process holds the lock.
    pub fn open() -> Result<Self> {
        let cwd = std::env::current_dir().context("cannot read the current directory")?;
        let repo = GitRepository::discover(&cwd)?;
        let config = config::load(&repo.private_dir())?;
        let options = CacheOptions {
            max_loaded_bugs: config.max_loaded_bugs,
        };
        let cache = RepoCache::open_with(repo, options)?;
        Ok(Self { cache, config })
    }

    /// `remote` or the configured default.
    #[must_use]
    pub fn remote(&self, remote: Option<&str>) -> String {
        remote.map_or_else(|| self.config.default_remote.clone(), ToString::to_string)
    }
}

/// Run `f` against an open workspace, then close it.
///
/// The command's own error wins over a failure to close.
///
/// # Errors
///
/// Returns whatever `f` or [`Workspace::open`] returns, or the close error.
pub fn with_workspace<T>(f: impl FnOnce(&mut Workspace) -> Result<T>) -> Result<T> {
    let mut workspace = Workspace::open()?;
    let result = f(&mut workspace);
    let closed = workspace.cache.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
