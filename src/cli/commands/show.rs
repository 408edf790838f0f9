//! Show command implementation.

use anyhow::Result;
use gitbug_lib::bug::short_id;

use super::{print_json, with_workspace};
use crate::cli::IdArgs;
use crate::format::{BugDetails, format_bug_details};

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the id does not resolve to exactly one bug.
pub fn execute(args: &IdArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let bug = ws.cache.resolve_bug_prefix(&args.id)?;
        let details = BugDetails {
            id: bug.id().to_string(),
            human_id: short_id(bug.id(), ws.config.id_length).to_string(),
            snapshot: bug.snapshot(),
        };

        if json {
            print_json(&details)?;
        } else {
            print!("{}", format_bug_details(&details.human_id, &details.snapshot));
        }
        Ok(())
    })
}
