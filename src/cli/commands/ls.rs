//! Ls command implementation.
//!
//! Query terms are joined with spaces and parsed as one query, so
//! `git-bug ls status:open crash` and `git-bug ls "status:open crash"` agree.

use anyhow::Result;
use gitbug_lib::Query;

use super::{print_json, with_workspace};
use crate::cli::LsArgs;
use crate::format::{BugSummary, format_bug_line};

/// Execute the ls command.
///
/// # Errors
///
/// Returns an error if the query does not parse or the cache cannot be opened.
pub fn execute(args: &LsArgs, json: bool) -> Result<()> {
    let query = Query::parse(&args.query.join(" "))?;
    tracing::debug!(?query, "listing bugs");

    with_workspace(|ws| {
        let ids = ws.cache.query_bugs(Some(&query));
        let excerpts: Vec<_> = ids.iter().filter_map(|id| ws.cache.excerpt(id)).collect();

        if json {
            let summaries: Vec<BugSummary> = excerpts
                .iter()
                .map(|e| BugSummary::from_excerpt(e, ws.config.id_length))
                .collect();
            print_json(&summaries)?;
        } else if excerpts.is_empty() {
            println!("No bugs found.");
        } else {
            for excerpt in &excerpts {
                println!("{}", format_bug_line(excerpt, ws.config.id_length));
            }
        }
        Ok(())
    })
}
