//! Core data types for gitbug-lib.
//!
//! Everything here is either part of an operation's payload or part of the
//! read-model folded from a bug's operation log.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BugError;

/// Identity of whoever authored an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// True when `needle` appears (case-insensitively) in the name or email.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.email.to_lowercase().contains(&needle)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Content address of a file attached to a comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHash(pub String);

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bug lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    Closed,
}

impl Status {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = BugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" | "close" => Ok(Self::Closed),
            other => Err(BugError::validation(
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// A message attached to a bug. The first comment holds the bug description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: Person,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileHash>,
    pub unix_time: i64,
}

/// Read-model of a bug, derived by folding its operation log.
///
/// Never persisted as a source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub title: String,
    pub author: Person,
    pub created_at: i64,
    /// Timestamp of the latest operation folded so far.
    pub edited_at: i64,
    pub status: Status,
    /// Sorted and unique.
    pub labels: Vec<String>,
    pub comments: Vec<Comment>,
}

impl Snapshot {
    /// The description is the message of the first comment.
    #[must_use]
    pub fn description(&self) -> &str {
        self.comments.first().map_or("", |c| c.message.as_str())
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).is_ok()
    }
}

/// Convert a unix timestamp to a `DateTime`, clamping invalid values to the epoch.
#[must_use]
pub fn unix_to_datetime(unix_time: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(unix_time, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_display() {
        assert_eq!(
            Person::new("René", "rene@example.com").to_string(),
            "René <rene@example.com>"
        );
        assert_eq!(Person::new("anon", "").to_string(), "anon");
    }

    #[test]
    fn test_person_matches_case_insensitive() {
        let p = Person::new("Alice Martin", "alice@example.com");
        assert!(p.matches("alice"));
        assert!(p.matches("MARTIN"));
        assert!(p.matches("example.com"));
        assert!(!p.matches("bob"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("open".parse::<Status>().unwrap(), Status::Open);
        assert_eq!("Closed".parse::<Status>().unwrap(), Status::Closed);
        assert!("wontfix".parse::<Status>().is_err());
    }

    #[test]
    fn test_snapshot_description_and_labels() {
        let snap = Snapshot {
            labels: vec!["bug".to_string(), "ui".to_string()],
            comments: vec![Comment {
                author: Person::default(),
                message: "first".to_string(),
                files: vec![],
                unix_time: 1,
            }],
            ..Default::default()
        };
        assert_eq!(snap.description(), "first");
        assert!(snap.has_label("ui"));
        assert!(!snap.has_label("core"));
    }

    #[test]
    fn test_unix_to_datetime() {
        assert_eq!(unix_to_datetime(0), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(unix_to_datetime(86_400).timestamp(), 86_400);
    }
}
