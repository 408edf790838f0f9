use gitbug_lib::bug::short_id;
use gitbug_lib::excerpt::BugExcerpt;
use gitbug_lib::merge::MergeResult;
use gitbug_lib::model::{Comment, Person, Snapshot, Status};
use serde::Serialize;

use super::text::format_time;

/// Bug summary for list views.
#[derive(Debug, Clone, Serialize)]
pub struct BugSummary {
    pub id: String,
    pub human_id: String,
    pub title: String,
    pub author: Person,
    pub status: Status,
    pub labels: Vec<String>,
    pub comments: usize,
    pub created_at: String,
    pub edited_at: String,
}

impl BugSummary {
    /// Summary of `excerpt` with its id shortened to `id_len` characters.
    #[must_use]
    pub fn from_excerpt(excerpt: &BugExcerpt, id_len: usize) -> Self {
        Self {
            id: excerpt.id.clone(),
            human_id: short_id(&excerpt.id, id_len).to_string(),
            title: excerpt.title.clone(),
            author: excerpt.author.clone(),
            status: excerpt.status,
            labels: excerpt.labels.clone(),
            comments: excerpt.comment_count,
            created_at: format_time(excerpt.created_at),
            edited_at: format_time(excerpt.edited_at),
        }
    }
}

/// Bug with its full comment thread for show view.
#[derive(Debug, Clone, Serialize)]
pub struct BugDetails {
    pub id: String,
    pub human_id: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

/// One line of pull output.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutput {
    pub id: String,
    pub status: String,
}

impl From<&MergeResult> for MergeOutput {
    fn from(result: &MergeResult) -> Self {
        Self {
            id: result.id.clone(),
            status: result.status.to_string(),
        }
    }
}

/// A comment as shown after `comment`.
#[derive(Debug, Clone, Serialize)]
pub struct CommentOutput<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub comment: &'a Comment,
}
