//! `gitbug` - distributed issue tracker embedded in git
//!
//! This crate provides the `git-bug` CLI on top of [`gitbug_lib`], which
//! holds the bug model, the excerpt index, queries and merging.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`storage`] - git-backed bug store (`refs/bugs/*`)
//! - [`config`] - Configuration management
//! - [`format`] - Output formatting (text, JSON)
//! - [`logging`] - Diagnostic logging to stderr

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod format;
pub mod logging;
pub mod storage;

pub use gitbug_lib::{BugError, Result};

/// Run the CLI application.
///
/// This is the main entry point called from `main()`.
///
/// # Errors
///
/// Returns an error if command execution fails.
pub fn run() -> anyhow::Result<()> {
    cli::run()
}
