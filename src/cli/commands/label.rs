//! Label command implementation.

use anyhow::Result;
use gitbug_lib::BugError;
use gitbug_lib::bug::short_id;

use super::{print_json, with_workspace};
use crate::cli::LabelArgs;

/// Split `+name`/`name` and `-name` arguments into added and removed labels.
#[must_use]
pub fn split_changes(changes: &[String]) -> (Vec<String>, Vec<String>) {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for change in changes {
        if let Some(label) = change.strip_prefix('-') {
            removed.push(label.to_string());
        } else {
            added.push(change.strip_prefix('+').unwrap_or(change).to_string());
        }
    }
    (added, removed)
}

/// Execute the label command. Without changes, prints the current labels.
///
/// # Errors
///
/// Returns an error if the id does not resolve, a label is malformed, or the
/// commit fails.
pub fn execute(args: &LabelArgs, json: bool) -> Result<()> {
    with_workspace(|ws| {
        let mut bug = ws.cache.resolve_bug_prefix(&args.id)?;

        if args.changes.is_empty() {
            let labels = bug.snapshot().labels;
            if json {
                print_json(&labels)?;
            } else {
                for label in &labels {
                    println!("{label}");
                }
            }
            return Ok(());
        }

        let (added, removed) = split_changes(&args.changes);
        let (added, removed) = match bug.change_labels(&added, &removed) {
            Ok(changed) => changed,
            Err(BugError::NothingToDo { reason }) => {
                tracing::debug!(%reason, "labels unchanged");
                (Vec::new(), Vec::new())
            }
            Err(e) => return Err(e.into()),
        };

        if json {
            print_json(&serde_json::json!({
                "id": bug.id(),
                "added": added,
                "removed": removed,
            }))?;
        } else if added.is_empty() && removed.is_empty() {
            println!("Labels of {} unchanged", short_id(bug.id(), ws.config.id_length));
        } else {
            for label in &added {
                println!("+ {label}");
            }
            for label in &removed {
                println!("- {label}");
            }
        }
        Ok(())
    })
}
