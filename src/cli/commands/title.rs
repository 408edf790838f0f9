//! Title command implementation.

use anyhow::Result;
use gitbug_lib::bug::short_id;

use super::{print_json, with_workspace};
use crate::cli::TitleArgs;

/// Execute the title command.
///
/// # Errors
///
/// Returns an error if the id does not resolve or the title is rejected.
pub fn execute(args: &TitleArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let mut bug = ws.cache.resolve_bug_prefix(&args.id)?;
        bug.set_title(&args.title)?;

        if json {
            print_json(&serde_json::json!({ "id": bug.id(), "title": args.title }))?;
        } else {
            let id = short_id(bug.id(), ws.config.id_length);
            println!("Retitled {id}: {}", args.title);
        }
        Ok(())
    })
}
