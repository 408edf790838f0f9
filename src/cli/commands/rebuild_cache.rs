//! Rebuild-cache command implementation.

use anyhow::Result;

use super::{print_json, with_workspace};

/// Regenerate the excerpt index from every bug in the store.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the index cannot be written.
pub fn execute(json: bool) -> Result<()> {
    with_workspace(|ws| {
        ws.cache.rebuild_index()?;
        let count = ws.cache.all_bug_ids().len();
        if json {
            print_json(&serde_json::json!({
                "bugs": count,
                "index": ws.cache.index_path(),
            }))?;
        } else {
            println!("Rebuilt the index of {count} bug(s)");
        }
        Ok(())
    })
}
