//! Open and close commands.

use anyhow::Result;
use gitbug_lib::bug::short_id;
use gitbug_lib::{BugError, Status};

use super::{print_json, with_workspace};
use crate::cli::IdArgs;

/// Move the bug named by `args` to `status`.
///
/// A bug already in `status` is reported and left alone.
///
/// # Errors
///
/// Returns an error if the id does not resolve or the commit fails.
pub fn execute(args: &IdArgs, status: Status, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let mut bug = ws.cache.resolve_bug_prefix(&args.id)?;
        let changed = match bug.set_status(status) {
            Ok(()) => true,
            Err(BugError::NothingToDo { reason }) => {
                tracing::debug!(%reason, "status unchanged");
                false
            }
            Err(e) => return Err(e.into()),
        };

        if json {
            print_json(&serde_json::json!({
                "id": bug.id(),
                "status": status,
                "changed": changed,
            }))?;
        } else {
            let id = short_id(bug.id(), ws.config.id_length);
            if changed {
                println!("{id} is now {status}");
            } else {
                println!("{id} is already {status}");
            }
        }
        Ok(())
    })
}
