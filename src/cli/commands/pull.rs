//! Pull command implementation.
//!
//! Fetches the remote's bugs, then merges them one at a time. The first
//! failed merge aborts the pull with a non-zero exit; the index is still
//! written so bugs merged before the failure stay listed.

use anyhow::Result;
use gitbug_lib::{MergeResult, MergeStatus, RepoCache, Repository};

use super::{print_json, with_workspace};
use crate::cli::RemoteArgs;
use crate::format::{MergeOutput, format_merge_result};

/// Execute the pull command.
///
/// # Errors
///
/// Returns an error if the fetch fails or any bug fails to merge.
pub fn execute(args: &RemoteArgs, json: bool, quiet: bool) -> Result<()> {
    with_workspace(|ws| {
        let remote = ws.remote(args.remote.as_deref());
        let id_len = ws.config.id_length;
        let chatty = !json && !quiet;

        if chatty {
            println!("Fetching remote ...");
        }
        let transcript = ws.cache.fetch(&remote)?;
        if chatty {
            println!("{}", transcript.trim_end());
            println!();
            println!("Merging data ...");
        }

        let mut outputs = Vec::new();
        merge_remote(&mut ws.cache, &remote, |result| {
            if json {
                outputs.push(MergeOutput::from(result));
            } else {
                println!("{}", format_merge_result(result, id_len));
            }
        })?;

        if json {
            print_json(&outputs)?;
        }
        Ok(())
    })
}

/// Merge every fetched bug of `remote`, passing each result that changed or
/// rejected something to `report`.
///
/// # Errors
///
/// Returns the first merge error, after writing the index for the bugs
/// merged before it.
pub fn merge_remote<R: Repository>(
    cache: &mut RepoCache<R>,
    remote: &str,
    mut report: impl FnMut(&MergeResult),
) -> Result<()> {
    let mut failure = None;
    for result in cache.merge_all(remote)? {
        match result {
            Ok(result) if result.status == MergeStatus::Nothing => {}
            Ok(result) => report(&result),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let Some(e) = failure else {
        return Ok(());
    };
    if let Err(flush) = cache.flush_index() {
        tracing::warn!(error = %flush, "failed to write the excerpt index after a failed merge");
    }
    Err(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitbug_lib::{Bug, MemoryRepository, Person};

    fn ada() -> Person {
        Person::new("Ada", "ada@example.com")
    }

    #[test]
    fn test_failed_merge_keeps_earlier_bugs_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let mut upstream = MemoryRepository::new(dir.path().join("upstream"));
        upstream.set_identity(ada());
        let mut local = MemoryRepository::new(dir.path().join("local"));
        local.set_identity(ada());
        local.add_remote("origin", &upstream);

        let mut bugs: Vec<(String, &str)> = ["first", "second"]
            .into_iter()
            .map(|title| {
                let mut bug = Bug::create(ada(), title, "description", vec![]).unwrap();
                bug.commit(&mut upstream).unwrap();
                (bug.id().to_string(), title)
            })
            .collect();
        bugs.sort();
        let ids: Vec<String> = bugs.iter().map(|(id, _)| id.clone()).collect();
        local.reject_import(ids[1].clone());

        {
            let mut cache = RepoCache::open(&mut local).unwrap();
            cache.fetch("origin").unwrap();
            let mut reported = Vec::new();
            let result = merge_remote(&mut cache, "origin", |r| reported.push(r.id.clone()));
            assert!(result.is_err());
            assert_eq!(reported, vec![ids[0].clone()]);
            assert!(!cache.is_index_dirty());
            cache.close().unwrap();
        }

        let cache = RepoCache::open(&mut local).unwrap();
        assert_eq!(cache.all_bug_ids(), vec![ids[0].clone()]);
        assert_eq!(cache.excerpt(&ids[0]).unwrap().title, bugs[0].1);
        cache.close().unwrap();
    }
}
