//! Text formatting functions for `gitbug`.
//!
//! Provides plain text (non-ANSI) formatting for terminal output:
//! - Status icons (○ ✓)
//! - Width-aware title truncation
//! - Bug list lines, bug details and merge results

use std::fmt::Write as _;

use gitbug_lib::bug::short_id;
use gitbug_lib::excerpt::BugExcerpt;
use gitbug_lib::merge::MergeResult;
use gitbug_lib::model::{Snapshot, Status, unix_to_datetime};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Status icon characters.
pub mod icons {
    /// Open bug (hollow circle).
    pub const OPEN: &str = "○";
    /// Closed bug (checkmark).
    pub const CLOSED: &str = "✓";
}

/// Longest title shown in a list line, in terminal columns.
pub const MAX_TITLE_WIDTH: usize = 60;

/// Return the icon character for a status.
#[must_use]
pub const fn format_status_icon(status: Status) -> &'static str {
    match status {
        Status::Open => icons::OPEN,
        Status::Closed => icons::CLOSED,
    }
}

/// Cut `text` to at most `max` terminal columns, ending with `…` when cut.
#[must_use]
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

/// Format a unix timestamp as `YYYY-MM-DD HH:MM` in UTC.
#[must_use]
pub fn format_time(unix_time: i64) -> String {
    unix_to_datetime(unix_time)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Format a single-line bug summary.
///
/// Format: `{icon} {id} {title} [{labels}] ({comments})`
#[must_use]
pub fn format_bug_line(excerpt: &BugExcerpt, id_len: usize) -> String {
    let mut line = format!(
        "{} {} {}",
        format_status_icon(excerpt.status),
        short_id(&excerpt.id, id_len),
        truncate_to_width(&excerpt.title, MAX_TITLE_WIDTH),
    );
    if !excerpt.labels.is_empty() {
        let _ = write!(line, " [{}]", excerpt.labels.join(", "));
    }
    if excerpt.comment_count > 1 {
        let _ = write!(line, " ({} comments)", excerpt.comment_count);
    }
    line
}

/// Format a bug with its comments for `show`.
#[must_use]
pub fn format_bug_details(id: &str, snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} {}",
        format_status_icon(snapshot.status),
        id,
        snapshot.title
    );
    let _ = writeln!(
        out,
        "{} opened this bug on {}, last edited {}",
        snapshot.author,
        format_time(snapshot.created_at),
        format_time(snapshot.edited_at)
    );
    if !snapshot.labels.is_empty() {
        let _ = writeln!(out, "labels: {}", snapshot.labels.join(", "));
    }

    for (i, comment) in snapshot.comments.iter().enumerate() {
        let _ = writeln!(
            out,
            "\n#{i} {} on {}",
            comment.author,
            format_time(comment.unix_time)
        );
        for line in comment.message.lines() {
            let _ = writeln!(out, "    {line}");
        }
        for file in &comment.files {
            let _ = writeln!(out, "    [file {file}]");
        }
    }
    out
}

/// Format one merge result as `{short id}: {status}`.
#[must_use]
pub fn format_merge_result(result: &MergeResult, id_len: usize) -> String {
    format!("{}: {}", short_id(&result.id, id_len), result.status)
}
