//! Output formatting for `gitbug`.
//!
//! Supports both human-readable text output and machine-parseable JSON.
//!
//! # JSON Output Types
//!
//! - [`BugSummary`] - Bug excerpt (ls)
//! - [`BugDetails`] - Bug with its comments (show)
//! - [`MergeOutput`] - Per-bug merge status (pull)

mod output;
mod text;

pub use output::{BugDetails, BugSummary, CommentOutput, MergeOutput};
pub use text::{
    format_bug_details, format_bug_line, format_merge_result, format_status_icon, format_time,
    truncate_to_width,
};
