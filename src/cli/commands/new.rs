//! New command implementation.

use anyhow::Result;
use gitbug_lib::FileHash;
use gitbug_lib::bug::short_id;

use super::{print_json, with_workspace};
use crate::cli::NewArgs;
use crate::format::BugSummary;

/// Execute the new command.
///
/// # Errors
///
/// Returns an error if the title or message is rejected or the commit fails.
pub fn execute(args: &NewArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let files = args.files.iter().cloned().map(FileHash).collect();
        let id = ws
            .cache
            .new_bug_with_files(&args.title, &args.message, files)?
            .id()
            .to_string();
        let id_len = ws.config.id_length;

        if json {
            if let Some(excerpt) = ws.cache.excerpt(&id) {
                print_json(&BugSummary::from_excerpt(excerpt, id_len))?;
            }
        } else {
            println!("{} created", short_id(&id, id_len));
        }
        Ok(())
    })
}
