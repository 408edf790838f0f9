//! The collaborator store: where operation logs durably live.
//!
//! [`Repository`] is the seam between the issue model and the version-control
//! backend. The git implementation lives in the `gitbug` binary crate;
//! [`MemoryRepository`] keeps everything in memory and links remotes by
//! sharing stores, which is what embedders and tests use.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BugError, Result};
use crate::model::Person;
use crate::operation::Operation;

/// One durable unit of a bug's log: the operations written by a single commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Content address of the entry in the store.
    pub hash: String,
    pub operations: Vec<Operation>,
}

/// Version-control backend holding every bug's operation log.
pub trait Repository {
    /// Repository-private directory for non-replicated state (lock, index).
    fn private_dir(&self) -> PathBuf;

    /// Resolve the acting author from the ambient environment.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no identity is configured.
    fn user_identity(&self) -> Result<Person>;

    /// Enumerate every bug id in the local store.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store cannot be listed.
    fn list_bugs(&self) -> Result<Vec<String>>;

    /// Read the full local log of a bug, oldest entry first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the bug is unknown, `Storage` on read failure.
    fn read_log(&self, id: &str) -> Result<Vec<LogEntry>>;

    /// Durably append one entry holding `operations` to a bug's log,
    /// creating the log if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write fails; nothing is appended in that case.
    fn append_entry(&mut self, id: &str, operations: &[Operation]) -> Result<LogEntry>;

    /// Enumerate bug ids known for `remote` as of the last fetch.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the remote-tracking data cannot be listed.
    fn list_remote_bugs(&self, remote: &str) -> Result<Vec<String>>;

    /// Read a bug's log as of the last fetch from `remote`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the remote has no such bug, `Storage` on read failure.
    fn read_remote_log(&self, remote: &str, id: &str) -> Result<Vec<LogEntry>>;

    /// Make the local log of `id` equal to the fetched remote log.
    ///
    /// Only called once the caller has checked the remote log extends the
    /// local one (or the bug is new locally).
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the update fails.
    fn import_remote_log(&mut self, remote: &str, id: &str) -> Result<()>;

    /// Download remote logs into remote-tracking storage. Local logs are untouched.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the transport fails.
    fn fetch(&mut self, remote: &str) -> Result<String>;

    /// Upload local logs to `remote`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the transport fails or the remote rejects an update.
    fn push(&mut self, remote: &str) -> Result<String>;
}

impl<R: Repository + ?Sized> Repository for &mut R {
    fn private_dir(&self) -> PathBuf {
        (**self).private_dir()
    }

    fn user_identity(&self) -> Result<Person> {
        (**self).user_identity()
    }

    fn list_bugs(&self) -> Result<Vec<String>> {
        (**self).list_bugs()
    }

    fn read_log(&self, id: &str) -> Result<Vec<LogEntry>> {
        (**self).read_log(id)
    }

    fn append_entry(&mut self, id: &str, operations: &[Operation]) -> Result<LogEntry> {
        (**self).append_entry(id, operations)
    }

    fn list_remote_bugs(&self, remote: &str) -> Result<Vec<String>> {
        (**self).list_remote_bugs(remote)
    }

    fn read_remote_log(&self, remote: &str, id: &str) -> Result<Vec<LogEntry>> {
        (**self).read_remote_log(remote, id)
    }

    fn import_remote_log(&mut self, remote: &str, id: &str) -> Result<()> {
        (**self).import_remote_log(remote, id)
    }

    fn fetch(&mut self, remote: &str) -> Result<String> {
        (**self).fetch(remote)
    }

    fn push(&mut self, remote: &str) -> Result<String> {
        (**self).push(remote)
    }
}

/// Content address for an entry appended after `parent`.
fn entry_hash(parent: Option<&str>, operations: &[Operation]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(parent.unwrap_or("").as_bytes());
    hasher.update(b"\x00");
    hasher.update(serde_json::to_vec(operations)?);
    Ok(format!("{:x}", hasher.finalize()))
}

fn is_prefix(prefix: &[LogEntry], log: &[LogEntry]) -> bool {
    prefix.len() <= log.len() && prefix.iter().zip(log).all(|(a, b)| a.hash == b.hash)
}

type Logs = BTreeMap<String, Vec<LogEntry>>;

/// In-memory [`Repository`].
///
/// Remotes are other `MemoryRepository` values registered with
/// [`MemoryRepository::add_remote`]; they share the underlying store, so a
/// push from one is visible to a fetch from the other.
pub struct MemoryRepository {
    private_dir: PathBuf,
    identity: Option<Person>,
    logs: Rc<RefCell<Logs>>,
    remotes: HashMap<String, Rc<RefCell<Logs>>>,
    tracking: HashMap<String, Logs>,
    read_only: bool,
    rejected_imports: HashSet<String>,
}

impl MemoryRepository {
    /// Create an empty repository keeping its private state under `private_dir`.
    #[must_use]
    pub fn new(private_dir: impl Into<PathBuf>) -> Self {
        Self {
            private_dir: private_dir.into(),
            identity: None,
            logs: Rc::new(RefCell::new(BTreeMap::new())),
            remotes: HashMap::new(),
            tracking: HashMap::new(),
            read_only: false,
            rejected_imports: HashSet::new(),
        }
    }

    /// Set the identity returned by `user_identity`.
    pub fn set_identity(&mut self, person: Person) {
        self.identity = Some(person);
    }

    /// Register `other` as remote `name`.
    pub fn add_remote(&mut self, name: impl Into<String>, other: &Self) {
        self.remotes.insert(name.into(), Rc::clone(&other.logs));
    }

    /// Make every write fail with a storage error.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Make importing bug `id` from any remote fail with a storage error.
    pub fn reject_import(&mut self, id: impl Into<String>) {
        self.rejected_imports.insert(id.into());
    }

    fn remote_store(&self, remote: &str) -> Result<&Rc<RefCell<Logs>>> {
        self.remotes
            .get(remote)
            .ok_or_else(|| BugError::storage(format!("unknown remote '{remote}'")))
    }

    fn tracking_log(&self, remote: &str, id: &str) -> Result<Vec<LogEntry>> {
        self.tracking
            .get(remote)
            .and_then(|logs| logs.get(id))
            .cloned()
            .ok_or_else(|| BugError::not_found(id))
    }
}

impl Repository for MemoryRepository {
    fn private_dir(&self) -> PathBuf {
        self.private_dir.clone()
    }

    fn user_identity(&self) -> Result<Person> {
        self.identity
            .clone()
            .ok_or_else(|| BugError::Config("no user identity configured".to_string()))
    }

    fn list_bugs(&self) -> Result<Vec<String>> {
        Ok(self.logs.borrow().keys().cloned().collect())
    }

    fn read_log(&self, id: &str) -> Result<Vec<LogEntry>> {
        self.logs
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| BugError::not_found(id))
    }

    fn append_entry(&mut self, id: &str, operations: &[Operation]) -> Result<LogEntry> {
        if self.read_only {
            return Err(BugError::storage("repository is read-only"));
        }

        let mut logs = self.logs.borrow_mut();
        let log = logs.entry(id.to_string()).or_default();
        let parent = log.last().map(|e| e.hash.as_str());
        let entry = LogEntry {
            hash: entry_hash(parent, operations)?,
            operations: operations.to_vec(),
        };
        log.push(entry.clone());
        Ok(entry)
    }

    fn list_remote_bugs(&self, remote: &str) -> Result<Vec<String>> {
        Ok(self
            .tracking
            .get(remote)
            .map(|logs| logs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_remote_log(&self, remote: &str, id: &str) -> Result<Vec<LogEntry>> {
        self.tracking_log(remote, id)
    }

    fn import_remote_log(&mut self, remote: &str, id: &str) -> Result<()> {
        if self.read_only {
            return Err(BugError::storage("repository is read-only"));
        }
        if self.rejected_imports.contains(id) {
            return Err(BugError::storage(format!("import of {id} rejected")));
        }
        let log = self.tracking_log(remote, id)?;
        self.logs.borrow_mut().insert(id.to_string(), log);
        Ok(())
    }

    fn fetch(&mut self, remote: &str) -> Result<String> {
        let fetched = self.remote_store(remote)?.borrow().clone();
        let previous = self.tracking.remove(remote).unwrap_or_default();

        let mut transcript = String::new();
        for (id, log) in &fetched {
            match previous.get(id) {
                None => transcript.push_str(&format!(" * [new bug]  {id}\n")),
                Some(old) if old != log => transcript.push_str(&format!("   updated    {id}\n")),
                Some(_) => {}
            }
        }
        if transcript.is_empty() {
            transcript.push_str("Already up to date.\n");
        }

        self.tracking.insert(remote.to_string(), fetched);
        Ok(transcript)
    }

    fn push(&mut self, remote: &str) -> Result<String> {
        let store = Rc::clone(self.remote_store(remote)?);
        let local = self.logs.borrow().clone();
        let mut remote_logs = store.borrow_mut();

        let mut transcript = String::new();
        let mut rejected = Vec::new();
        for (id, log) in local {
            match remote_logs.get(&id) {
                Some(existing) if existing == &log => {}
                Some(existing) if !is_prefix(existing, &log) => rejected.push(id),
                _ => {
                    transcript.push_str(&format!("   pushed     {id}\n"));
                    remote_logs.insert(id, log);
                }
            }
        }

        if !rejected.is_empty() {
            return Err(BugError::storage(format!(
                "push rejected (non-fast-forward) for {}",
                rejected.join(", ")
            )));
        }
        if transcript.is_empty() {
            transcript.push_str("Everything up-to-date\n");
        }
        Ok(transcript)
    }
}
