//! The `Bug` aggregate: an identity plus an append-only operation log.
//!
//! Operations are first staged, then made durable by [`Bug::commit`], which
//! writes them as one new log entry. The read-model is never stored; it is
//! recomputed by [`Bug::compile`].

use sha2::{Digest, Sha256};

use crate::error::{BugError, Result};
use crate::model::{FileHash, Person, Snapshot};
use crate::operation::Operation;
use crate::repository::{LogEntry, Repository};

/// Number of id characters shown to humans.
pub const HUMAN_ID_LEN: usize = 7;

/// An issue: its identity, committed log entries and staged operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bug {
    id: String,
    committed: Vec<LogEntry>,
    staged: Vec<Operation>,
}

impl Bug {
    /// Start a new bug by staging its `Create` operation.
    ///
    /// Nothing is written until [`Bug::commit`].
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the title or message is unacceptable.
    pub fn create(
        author: Person,
        title: impl Into<String>,
        message: impl Into<String>,
        files: Vec<FileHash>,
    ) -> Result<Self> {
        let create = Operation::create(author, title, message, files)?;
        Self::from_create(create)
    }

    /// Start a new bug from an already built `Create` operation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `create` is not a valid `Create` operation.
    pub fn from_create(create: Operation) -> Result<Self> {
        if !create.is_create() {
            return Err(BugError::validation(
                "operation",
                format!("a bug must start with create, got {}", create.kind()),
            ));
        }
        create.validate()?;

        Ok(Self {
            id: derive_id(&create)?,
            committed: Vec::new(),
            staged: vec![create],
        })
    }

    /// Wrap a durable log read from a store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLog` if the log is empty, does not start with exactly
    /// one `Create`, or holds an invalid operation.
    pub fn from_log(id: impl Into<String>, log: Vec<LogEntry>) -> Result<Self> {
        let id = id.into();
        check_log(&id, &log)?;
        Ok(Self {
            id,
            committed: log,
            staged: Vec::new(),
        })
    }

    /// Read a bug's durable log from the local store.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Storage` or `InvalidLog`.
    pub fn read<R: Repository + ?Sized>(repo: &R, id: &str) -> Result<Self> {
        Self::from_log(id, repo.read_log(id)?)
    }

    /// Read a bug's log as last fetched from `remote`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Storage` or `InvalidLog`.
    pub fn read_remote<R: Repository + ?Sized>(repo: &R, remote: &str, id: &str) -> Result<Self> {
        Self::from_log(id, repo.read_remote_log(remote, id)?)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shortened id for display.
    #[must_use]
    pub fn human_id(&self) -> &str {
        short_id(&self.id, HUMAN_ID_LEN)
    }

    /// Stage an operation after every currently staged one.
    pub fn append(&mut self, operation: Operation) {
        self.staged.push(operation);
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.committed
    }

    /// Committed then staged operations, in log order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.committed
            .iter()
            .flat_map(|entry| entry.operations.iter())
            .chain(self.staged.iter())
    }

    /// Write every staged operation as one new durable log entry.
    ///
    /// On failure the operations stay staged so the commit can be retried.
    ///
    /// # Errors
    ///
    /// Returns `NothingToDo` if nothing is staged, `Validation` if the staged
    /// operations would break the create invariant, `AlreadyExists` if a first
    /// commit finds a log under the same id, `Storage` if the write fails.
    pub fn commit<R: Repository + ?Sized>(&mut self, repo: &mut R) -> Result<()> {
        if self.staged.is_empty() {
            return Err(BugError::NothingToDo {
                reason: format!("bug {} has no pending operation", self.human_id()),
            });
        }
        self.check_staged()?;
        if self.committed.is_empty() {
            self.check_unused_id(repo)?;
        }

        let entry = repo.append_entry(&self.id, &self.staged)?;
        tracing::debug!(
            id = %self.id,
            entry = %entry.hash,
            operations = entry.operations.len(),
            "committed bug operations"
        );
        self.committed.push(entry);
        self.staged.clear();
        Ok(())
    }

    /// Fold committed and staged operations into a snapshot.
    #[must_use]
    pub fn compile(&self) -> Snapshot {
        self.operations()
            .fold(Snapshot::default(), |snapshot, op| op.apply(snapshot))
    }

    /// Timestamp of the first operation.
    #[must_use]
    pub fn created_unix(&self) -> i64 {
        self.operations().next().map_or(0, |op| op.unix_time)
    }

    /// Latest timestamp over all operations.
    #[must_use]
    pub fn last_edit_unix(&self) -> i64 {
        self.operations().map(|op| op.unix_time).max().unwrap_or(0)
    }

    /// Identical creates in the same second hash to the same id; the second
    /// one must not land on the first bug's log.
    fn check_unused_id<R: Repository + ?Sized>(&self, repo: &R) -> Result<()> {
        match repo.read_log(&self.id) {
            Ok(_) => Err(BugError::AlreadyExists {
                id: self.id.clone(),
            }),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn check_staged(&self) -> Result<()> {
        let mut expect_create = self.committed.is_empty();
        for op in &self.staged {
            if expect_create != op.is_create() {
                let reason = if expect_create {
                    "first operation must be create"
                } else {
                    "create can only be the first operation"
                };
                return Err(BugError::validation("operation", reason));
            }
            op.validate()?;
            expect_create = false;
        }
        Ok(())
    }
}

/// First `len` characters of `id`, or all of it if shorter.
#[must_use]
pub fn short_id(id: &str, len: usize) -> &str {
    let end = id.char_indices().nth(len).map_or(id.len(), |(i, _)| i);
    &id[..end]
}

/// Identity of a bug: the hash of its canonical `Create` operation.
fn derive_id(create: &Operation) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(create)?);
    Ok(format!("{:x}", hasher.finalize()))
}

fn check_log(id: &str, log: &[LogEntry]) -> Result<()> {
    let invalid = |reason: String| BugError::InvalidLog {
        id: id.to_string(),
        reason,
    };

    if log.is_empty() {
        return Err(invalid("empty log".to_string()));
    }

    let mut first = true;
    for entry in log {
        if entry.operations.is_empty() {
            return Err(invalid(format!("entry {} holds no operation", entry.hash)));
        }
        for op in &entry.operations {
            if first != op.is_create() {
                let reason = if first {
                    format!("log starts with {}", op.kind())
                } else {
                    format!("extra create operation in entry {}", entry.hash)
                };
                return Err(invalid(reason));
            }
            op.validate()
                .map_err(|e| invalid(format!("entry {}: {e}", entry.hash)))?;
            first = false;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::repository::MemoryRepository;
    use proptest::prelude::*;

    fn rene() -> Person {
        Person::new("René Descartes", "rene@descartes.fr")
    }

    fn repo() -> (tempfile::TempDir, MemoryRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new(dir.path());
        (dir, repo)
    }

    #[test]
    fn test_create_invariant() {
        let (_dir, mut repo) = repo();
        let mut bug = Bug::create(rene(), "title", "message", vec![]).unwrap();
        bug.commit(&mut repo).unwrap();

        let read = Bug::read(&repo, bug.id()).unwrap();
        let first = read.operations().next().unwrap();
        assert!(first.is_create());
        assert_eq!(read.operations().filter(|op| op.is_create()).count(), 1);

        let snap = read.compile();
        assert_eq!(snap.title, "title");
        assert_eq!(snap.author, rene());
        assert_eq!(snap.created_at, first.unix_time);
    }

    #[test]
    fn test_id_is_stable_across_commits() {
        let (_dir, mut repo) = repo();
        let mut bug = Bug::create(rene(), "title", "message", vec![]).unwrap();
        let id = bug.id().to_string();
        assert_eq!(id.len(), 64);
        assert_eq!(bug.human_id(), &id[..HUMAN_ID_LEN]);

        bug.commit(&mut repo).unwrap();
        bug.append(Operation::add_comment(rene(), "more", vec![]).unwrap());
        bug.commit(&mut repo).unwrap();
        assert_eq!(bug.id(), id);
        assert_eq!(bug.entries().len(), 2);
    }

    #[test]
    fn test_commit_failure_keeps_staged() {
        let (_dir, mut repo) = repo();
        let mut bug = Bug::create(rene(), "title", "message", vec![]).unwrap();
        repo.set_read_only(true);

        assert!(matches!(bug.commit(&mut repo), Err(BugError::Storage(_))));
        assert!(bug.has_pending());
        assert!(bug.entries().is_empty());

        repo.set_read_only(false);
        bug.commit(&mut repo).unwrap();
        assert!(!bug.has_pending());
        assert_eq!(bug.entries().len(), 1);
    }

    #[test]
    fn test_commit_nothing_staged() {
        let (_dir, mut repo) = repo();
        let mut bug = Bug::create(rene(), "title", "message", vec![]).unwrap();
        bug.commit(&mut repo).unwrap();
        assert!(matches!(
            bug.commit(&mut repo),
            Err(BugError::NothingToDo { .. })
        ));
    }

    #[test]
    fn test_second_create_rejected_at_commit() {
        let (_dir, mut repo) = repo();
        let mut bug = Bug::create(rene(), "title", "message", vec![]).unwrap();
        bug.commit(&mut repo).unwrap();
        bug.append(Operation::create(rene(), "again", "m", vec![]).unwrap());
        assert!(matches!(
            bug.commit(&mut repo),
            Err(BugError::Validation { .. })
        ));
    }

    #[test]
    fn test_identical_create_does_not_touch_existing_log() {
        let (_dir, mut repo) = repo();
        let create = || {
            Operation::create(rene(), "same", "same", vec![])
                .unwrap()
                .at(1_700_000_000)
        };

        let mut first = Bug::from_create(create()).unwrap();
        first.commit(&mut repo).unwrap();

        let mut second = Bug::from_create(create()).unwrap();
        assert_eq!(second.id(), first.id());
        let err = second.commit(&mut repo).unwrap_err();
        assert!(matches!(err, BugError::AlreadyExists { ref id } if id == first.id()));
        assert!(second.has_pending());

        let read = Bug::read(&repo, first.id()).unwrap();
        assert_eq!(read.entries().len(), 1);
        assert_eq!(read.compile().title, "same");
    }

    #[test]
    fn test_from_create_requires_create() {
        let op = Operation::add_comment(rene(), "m", vec![]).unwrap();
        assert!(Bug::from_create(op).is_err());
    }

    #[test]
    fn test_read_rejects_log_without_create() {
        let (_dir, mut repo) = repo();
        repo.append_entry("bad", &[Operation::add_comment(rene(), "m", vec![]).unwrap()])
            .unwrap();
        assert!(matches!(
            Bug::read(&repo, "bad"),
            Err(BugError::InvalidLog { .. })
        ));
    }

    #[test]
    fn test_compile_includes_staged() {
        let mut bug = Bug::create(rene(), "title", "message", vec![]).unwrap();
        bug.append(Operation::set_status(rene(), Status::Closed).unwrap());
        assert_eq!(bug.compile().status, Status::Closed);
    }

    #[test]
    fn test_timestamps() {
        let create = Operation::create(rene(), "t", "m", vec![]).unwrap().at(10);
        let mut bug = Bug::from_create(create).unwrap();
        bug.append(Operation::add_comment(rene(), "c", vec![]).unwrap().at(30));
        bug.append(Operation::add_comment(rene(), "c", vec![]).unwrap().at(20));
        assert_eq!(bug.created_unix(), 10);
        assert_eq!(bug.last_edit_unix(), 30);
        assert_eq!(bug.compile().edited_at, 30);
    }

    proptest! {
        #[test]
        fn prop_compile_is_deterministic(
            comments in proptest::collection::vec(("[a-z ]{1,20}", 0i64..1_000_000), 0..12)
        ) {
            let create = Operation::create(rene(), "title", "message", vec![]).unwrap().at(0);
            let mut bug = Bug::from_create(create).unwrap();
            for (message, time) in comments {
                if let Ok(op) = Operation::add_comment(rene(), message, vec![]) {
                    bug.append(op.at(time));
                }
            }

            let first = serde_json::to_vec(&bug.compile()).unwrap();
            let second = serde_json::to_vec(&bug.compile()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
