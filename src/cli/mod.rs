//! Command-line interface for `gitbug`.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::logging;

/// git-bug - distributed issue tracker embedded in git.
#[derive(Parser, Debug)]
#[command(name = "git-bug")]
#[command(
    author,
    version,
    about = "Distributed issue tracker embedded in git",
    long_about = None,
    after_help = "Bugs live in refs/bugs/* and travel with git fetch/push; no server needed."
)]
pub struct Cli {
    /// Output format: text (default) or json
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new bug
    New(NewArgs),

    /// List bugs matching a query
    #[command(alias = "list")]
    Ls(LsArgs),

    /// Show a bug and its comments
    Show(IdArgs),

    /// Add a comment to a bug
    Comment(CommentArgs),

    /// Change the title of a bug
    Title(TitleArgs),

    /// Reopen a bug
    Open(IdArgs),

    /// Close a bug
    Close(IdArgs),

    /// Show, add (+name or name) or remove (-name) labels
    Label(LabelArgs),

    /// Fetch bugs from a remote and merge them
    Pull(RemoteArgs),

    /// Push local bugs to a remote
    Push(RemoteArgs),

    /// Fetch bugs from a remote without merging
    Fetch(RemoteArgs),

    /// Rebuild the excerpt index from the stored bugs
    RebuildCache,

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Title of the bug
    #[arg(short, long)]
    pub title: String,

    /// Description of the bug
    #[arg(short, long)]
    pub message: String,

    /// Hash of a file attached to the description (repeatable)
    #[arg(long = "file", value_name = "HASH")]
    pub files: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Query terms, e.g. `status:open label:ui sort:creation-asc crash`
    pub query: Vec<String>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Bug id or unambiguous id prefix
    pub id: String,
}

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Bug id or unambiguous id prefix
    pub id: String,

    /// Comment text
    #[arg(short, long)]
    pub message: String,

    /// Hash of a file attached to the comment (repeatable)
    #[arg(long = "file", value_name = "HASH")]
    pub files: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TitleArgs {
    /// Bug id or unambiguous id prefix
    pub id: String,

    /// New title
    pub title: String,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Bug id or unambiguous id prefix
    pub id: String,

    /// Labels to add (`name` or `+name`) or remove (`-name`)
    #[arg(allow_hyphen_values = true)]
    pub changes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Remote name (defaults to the configured remote, usually origin)
    pub remote: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet, None)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let json = cli.json;
    match cli.command {
        Commands::New(args) => commands::new::execute(&args, json),
        Commands::Ls(args) => commands::ls::execute(&args, json),
        Commands::Show(args) => commands::show::execute(&args, json),
        Commands::Comment(args) => commands::comment::execute(&args, json),
        Commands::Title(args) => commands::title::execute(&args, json),
        Commands::Open(args) => commands::status::execute(&args, gitbug_lib::Status::Open, json),
        Commands::Close(args) => {
            commands::status::execute(&args, gitbug_lib::Status::Closed, json)
        }
        Commands::Label(args) => commands::label::execute(&args, json),
        Commands::Pull(args) => commands::pull::execute(&args, json, cli.quiet),
        Commands::Push(args) => commands::remote::push(&args, json),
        Commands::Fetch(args) => commands::remote::fetch(&args, json),
        Commands::RebuildCache => commands::rebuild_cache::execute(json),
        Commands::Completions(args) => {
            commands::completions::execute(&args);
            Ok(())
        }
        Commands::Version => commands::version::execute(json),
    }
}
