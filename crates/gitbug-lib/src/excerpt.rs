//! Compact projection of a bug used for indexing and querying.

use serde::{Deserialize, Serialize};

use crate::bug::Bug;
use crate::model::{Person, Snapshot, Status};

/// What the index keeps about one bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugExcerpt {
    pub id: String,
    pub title: String,
    pub author: Person,
    pub created_at: i64,
    pub edited_at: i64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub comment_count: usize,
}

impl BugExcerpt {
    /// Project `snapshot`, which must be `bug.compile()`.
    #[must_use]
    pub fn new(bug: &Bug, snapshot: &Snapshot) -> Self {
        Self {
            id: bug.id().to_string(),
            title: snapshot.title.clone(),
            author: snapshot.author.clone(),
            created_at: bug.created_unix(),
            edited_at: bug.last_edit_unix(),
            status: snapshot.status,
            labels: snapshot.labels.clone(),
            comment_count: snapshot.comments.len(),
        }
    }

    /// Project a bug by compiling it.
    #[must_use]
    pub fn from_bug(bug: &Bug) -> Self {
        Self::new(bug, &bug.compile())
    }
}
