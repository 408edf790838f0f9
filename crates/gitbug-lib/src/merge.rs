//! Reconciliation of a local bug log against a fetched remote log.
//!
//! Logs are only ever fast-forwarded. A remote log that rewrites history
//! relative to the local one is reported as invalid and left alone.

use std::fmt;

use crate::bug::Bug;
use crate::error::{BugError, Result};
use crate::repository::{LogEntry, Repository};

/// Outcome of merging one bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    /// Imported wholesale; the bug did not exist locally.
    New,
    /// The local log was fast-forwarded.
    Updated,
    /// Nothing to import.
    Nothing,
    /// The remote log was rejected.
    Invalid(String),
}

impl MergeStatus {
    /// True for `New` and `Updated`.
    #[must_use]
    pub const fn changed_local(&self) -> bool {
        matches!(self, Self::New | Self::Updated)
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Updated => f.write_str("updated"),
            Self::Nothing => f.write_str("nothing"),
            Self::Invalid(reason) => write!(f, "invalid data: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub id: String,
    pub status: MergeStatus,
    /// The bug as it is locally after the merge, for `New` and `Updated`.
    pub bug: Option<Bug>,
}

impl MergeResult {
    fn unchanged(id: &str, status: MergeStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            bug: None,
        }
    }
}

/// Merge the fetched `remote` log of bug `id` into the local store.
///
/// # Errors
///
/// Returns `Storage` when the store cannot be read or written. Malformed or
/// diverging remote logs are not errors; they yield [`MergeStatus::Invalid`].
pub fn merge_bug<R: Repository + ?Sized>(repo: &mut R, remote: &str, id: &str) -> Result<MergeResult> {
    let remote_bug = match Bug::read_remote(repo, remote, id) {
        Ok(bug) => bug,
        Err(BugError::InvalidLog { reason, .. }) => {
            return Ok(MergeResult::unchanged(id, MergeStatus::Invalid(reason)));
        }
        Err(e) => return Err(e),
    };

    let local = match repo.read_log(id) {
        Ok(log) => Some(log),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    let status = match local {
        None => MergeStatus::New,
        Some(local) => match compare(&local, remote_bug.entries()) {
            LogRelation::Same | LogRelation::LocalAhead => MergeStatus::Nothing,
            LogRelation::RemoteAhead => MergeStatus::Updated,
            LogRelation::Diverged => {
                return Ok(MergeResult::unchanged(
                    id,
                    MergeStatus::Invalid("local and remote histories diverged".to_string()),
                ));
            }
        },
    };

    if !status.changed_local() {
        return Ok(MergeResult::unchanged(id, status));
    }

    repo.import_remote_log(remote, id)?;
    tracing::debug!(%id, %remote, %status, "merged bug");
    Ok(MergeResult {
        id: id.to_string(),
        status,
        bug: Some(remote_bug),
    })
}

enum LogRelation {
    Same,
    LocalAhead,
    RemoteAhead,
    Diverged,
}

fn compare(local: &[LogEntry], remote: &[LogEntry]) -> LogRelation {
    let shared = local
        .iter()
        .zip(remote)
        .take_while(|(a, b)| a.hash == b.hash)
        .count();

    if shared < local.len().min(remote.len()) {
        return LogRelation::Diverged;
    }
    match local.len().cmp(&remote.len()) {
        std::cmp::Ordering::Equal => LogRelation::Same,
        std::cmp::Ordering::Greater => LogRelation::LocalAhead,
        std::cmp::Ordering::Less => LogRelation::RemoteAhead,
    }
}
