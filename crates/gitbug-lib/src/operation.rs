//! Operations: the immutable facts a bug's log is made of.
//!
//! The operation set is closed. Folding is done by [`Operation::apply`], a
//! single exhaustive `match`, so a new operation kind cannot be added without
//! deciding how it changes the [`Snapshot`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BugError, Result};
use crate::model::{Comment, FileHash, Person, Snapshot, Status};

const MAX_TITLE_LEN: usize = 500;

/// Discriminant of an operation, as written in the `type` field on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    AddComment,
    SetTitle,
    SetStatus,
    LabelChange,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::AddComment => "add_comment",
            Self::SetTitle => "set_title",
            Self::SetStatus => "set_status",
            Self::LabelChange => "label_change",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific part of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpPayload {
    Create {
        title: String,
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<FileHash>,
    },
    AddComment {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<FileHash>,
    },
    SetTitle {
        title: String,
        was: String,
    },
    SetStatus {
        status: Status,
    },
    LabelChange {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        added: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<String>,
    },
}

/// A single authored, timestamped fact about a bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub author: Person,
    pub unix_time: i64,
    #[serde(flatten)]
    pub payload: OpPayload,
}

impl Operation {
    fn now(author: Person, payload: OpPayload) -> Self {
        Self {
            author,
            unix_time: Utc::now().timestamp(),
            payload,
        }
    }

    /// Build a validated `Create` operation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the author, title or message is unacceptable.
    pub fn create(
        author: Person,
        title: impl Into<String>,
        message: impl Into<String>,
        files: Vec<FileHash>,
    ) -> Result<Self> {
        let op = Self::now(
            author,
            OpPayload::Create {
                title: title.into(),
                message: message.into(),
                files,
            },
        );
        op.validate()?;
        Ok(op)
    }

    /// Build a validated `AddComment` operation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the message is empty.
    pub fn add_comment(
        author: Person,
        message: impl Into<String>,
        files: Vec<FileHash>,
    ) -> Result<Self> {
        let op = Self::now(
            author,
            OpPayload::AddComment {
                message: message.into(),
                files,
            },
        );
        op.validate()?;
        Ok(op)
    }

    /// Build a validated `SetTitle` operation; `was` is the title being replaced.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the title is invalid or unchanged.
    pub fn set_title(
        author: Person,
        title: impl Into<String>,
        was: impl Into<String>,
    ) -> Result<Self> {
        let op = Self::now(
            author,
            OpPayload::SetTitle {
                title: title.into(),
                was: was.into(),
            },
        );
        op.validate()?;
        Ok(op)
    }

    /// Build a `SetStatus` operation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the author is invalid.
    pub fn set_status(author: Person, status: Status) -> Result<Self> {
        let op = Self::now(author, OpPayload::SetStatus { status });
        op.validate()?;
        Ok(op)
    }

    /// Build a validated `LabelChange` operation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a label is malformed or nothing changes.
    pub fn label_change(author: Person, added: Vec<String>, removed: Vec<String>) -> Result<Self> {
        let op = Self::now(author, OpPayload::LabelChange { added, removed });
        op.validate()?;
        Ok(op)
    }

    /// Override the timestamp.
    #[must_use]
    pub const fn at(mut self, unix_time: i64) -> Self {
        self.unix_time = unix_time;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self.payload {
            OpPayload::Create { .. } => OperationKind::Create,
            OpPayload::AddComment { .. } => OperationKind::AddComment,
            OpPayload::SetTitle { .. } => OperationKind::SetTitle,
            OpPayload::SetStatus { .. } => OperationKind::SetStatus,
            OpPayload::LabelChange { .. } => OperationKind::LabelChange,
        }
    }

    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(self.payload, OpPayload::Create { .. })
    }

    /// Check the constraints an operation must satisfy to enter a log.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.author.name.trim().is_empty() {
            return Err(BugError::validation("author", "name cannot be empty"));
        }

        match &self.payload {
            OpPayload::Create { title, message, .. } => {
                validate_title(title)?;
                if message.trim().is_empty() {
                    return Err(BugError::validation("message", "cannot be empty"));
                }
            }
            OpPayload::AddComment { message, .. } => {
                if message.trim().is_empty() {
                    return Err(BugError::validation("message", "cannot be empty"));
                }
            }
            OpPayload::SetTitle { title, was } => {
                validate_title(title)?;
                if title == was {
                    return Err(BugError::validation("title", "unchanged"));
                }
            }
            OpPayload::SetStatus { .. } => {}
            OpPayload::LabelChange { added, removed } => {
                if added.is_empty() && removed.is_empty() {
                    return Err(BugError::validation("labels", "no label added or removed"));
                }
                for label in added.iter().chain(removed) {
                    if label.is_empty() || label.chars().any(char::is_whitespace) {
                        return Err(BugError::validation(
                            "labels",
                            format!("invalid label '{label}'"),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Fold this operation into a snapshot.
    #[must_use]
    pub fn apply(&self, mut snapshot: Snapshot) -> Snapshot {
        match &self.payload {
            OpPayload::Create {
                title,
                message,
                files,
            } => {
                snapshot.title.clone_from(title);
                snapshot.author = self.author.clone();
                snapshot.created_at = self.unix_time;
                snapshot.status = Status::Open;
                snapshot.comments = vec![Comment {
                    author: self.author.clone(),
                    message: message.clone(),
                    files: files.clone(),
                    unix_time: self.unix_time,
                }];
            }
            OpPayload::AddComment { message, files } => {
                snapshot.comments.push(Comment {
                    author: self.author.clone(),
                    message: message.clone(),
                    files: files.clone(),
                    unix_time: self.unix_time,
                });
            }
            OpPayload::SetTitle { title, .. } => {
                snapshot.title.clone_from(title);
            }
            OpPayload::SetStatus { status } => {
                snapshot.status = *status;
            }
            OpPayload::LabelChange { added, removed } => {
                for label in added {
                    if let Err(pos) = snapshot.labels.binary_search(label) {
                        snapshot.labels.insert(pos, label.clone());
                    }
                }
                snapshot.labels.retain(|l| !removed.contains(l));
            }
        }

        snapshot.edited_at = snapshot.edited_at.max(self.unix_time);
        snapshot
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(BugError::validation("title", "cannot be empty"));
    }
    if title.contains('\n') || title.contains('\r') {
        return Err(BugError::validation("title", "must be a single line"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(BugError::validation("title", "exceeds 500 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rene() -> Person {
        Person::new("René Descartes", "rene@descartes.fr")
    }

    #[test]
    fn test_create_apply_populates_snapshot() {
        let op = Operation::create(rene(), "title", "message", vec![])
            .unwrap()
            .at(100);
        let snap = op.apply(Snapshot::default());

        assert_eq!(snap.title, "title");
        assert_eq!(snap.author, rene());
        assert_eq!(snap.created_at, 100);
        assert_eq!(snap.edited_at, 100);
        assert_eq!(snap.comments.len(), 1);
        assert_eq!(snap.comments[0].message, "message");
    }

    #[test]
    fn test_create_rejects_bad_title() {
        assert!(Operation::create(rene(), "  ", "message", vec![]).is_err());
        assert!(Operation::create(rene(), "two\nlines", "message", vec![]).is_err());
        assert!(Operation::create(rene(), "x".repeat(501), "message", vec![]).is_err());
    }

    #[test]
    fn test_create_rejects_empty_message_and_author() {
        let err = Operation::create(rene(), "title", "", vec![]).unwrap_err();
        assert!(matches!(err, BugError::Validation { ref field, .. } if field == "message"));

        let err = Operation::create(Person::default(), "title", "m", vec![]).unwrap_err();
        assert!(matches!(err, BugError::Validation { ref field, .. } if field == "author"));
    }

    #[test]
    fn test_comment_keeps_files() {
        let files = vec![FileHash("abc".to_string()), FileHash("def".to_string())];
        let create = Operation::create(rene(), "t", "m", vec![]).unwrap().at(1);
        let comment = Operation::add_comment(rene(), "with files", files.clone())
            .unwrap()
            .at(5);

        let snap = comment.apply(create.apply(Snapshot::default()));
        assert_eq!(snap.comments.len(), 2);
        assert_eq!(snap.comments[1].files, files);
        assert_eq!(snap.edited_at, 5);
    }

    #[test]
    fn test_set_title_last_wins() {
        let create = Operation::create(rene(), "first", "m", vec![]).unwrap();
        let rename = Operation::set_title(rene(), "second", "first").unwrap();
        let snap = rename.apply(create.apply(Snapshot::default()));
        assert_eq!(snap.title, "second");
    }

    #[test]
    fn test_set_title_unchanged_rejected() {
        assert!(Operation::set_title(rene(), "same", "same").is_err());
    }

    #[test]
    fn test_status_and_labels() {
        let create = Operation::create(rene(), "t", "m", vec![]).unwrap();
        let close = Operation::set_status(rene(), Status::Closed).unwrap();
        let labels = Operation::label_change(
            rene(),
            vec!["ui".to_string(), "bug".to_string(), "ui".to_string()],
            vec![],
        )
        .unwrap();
        let unlabel =
            Operation::label_change(rene(), vec![], vec!["ui".to_string()]).unwrap();

        let snap = unlabel.apply(labels.apply(close.apply(create.apply(Snapshot::default()))));
        assert_eq!(snap.status, Status::Closed);
        assert_eq!(snap.labels, vec!["bug".to_string()]);
    }

    #[test]
    fn test_label_change_validation() {
        assert!(Operation::label_change(rene(), vec![], vec![]).is_err());
        assert!(Operation::label_change(rene(), vec!["two words".to_string()], vec![]).is_err());
    }

    #[test]
    fn test_serde_tag_layout() {
        let op = Operation::add_comment(rene(), "hello", vec![]).unwrap().at(7);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "add_comment");
        assert_eq!(json["unix_time"], 7);
        assert_eq!(json["message"], "hello");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
        assert_eq!(back.kind(), OperationKind::AddComment);
    }
}
