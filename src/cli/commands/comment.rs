//! Comment command implementation.

use anyhow::Result;
use gitbug_lib::FileHash;
use gitbug_lib::bug::short_id;

use super::{print_json, with_workspace};
use crate::cli::CommentArgs;
use crate::format::CommentOutput;

/// Execute the comment command.
///
/// # Errors
///
/// Returns an error if the id does not resolve, the message is empty, or the
/// commit fails.
pub fn execute(args: &CommentArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let mut bug = ws.cache.resolve_bug_prefix(&args.id)?;
        let files = args.files.iter().cloned().map(FileHash).collect();
        bug.add_comment_with_files(&args.message, files)?;

        if json {
            let snapshot = bug.snapshot();
            if let Some(comment) = snapshot.comments.last() {
                print_json(&CommentOutput {
                    id: bug.id(),
                    comment,
                })?;
            }
        } else {
            println!("Commented on {}", short_id(bug.id(), ws.config.id_length));
        }
        Ok(())
    })
}
