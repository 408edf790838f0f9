//! `RepoCache`: single-writer access to a repository's bugs.
//!
//! The cache holds the repository lock for its whole lifetime, keeps the
//! excerpt index fully resident, and loads full bugs lazily. Every local
//! mutation rewrites the persisted index; a merge batch rewrites it once
//! after the last bug has been merged.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::bug::{short_id, Bug, HUMAN_ID_LEN};
use crate::error::{BugError, Result};
use crate::excerpt::BugExcerpt;
use crate::index::{self, ExcerptMap, INDEX_FILE};
use crate::lock::{RepoLock, LOCK_FILE};
use crate::merge::{self, MergeResult};
use crate::model::{FileHash, Snapshot, Status};
use crate::operation::Operation;
use crate::query::Query;
use crate::repository::Repository;

/// Tuning knobs for [`RepoCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Upper bound on fully loaded bugs kept in memory; `None` keeps all.
    /// The least recently resolved bug is evicted first.
    pub max_loaded_bugs: Option<usize>,
}

/// Cached, locked view over a [`Repository`].
pub struct RepoCache<R: Repository> {
    repo: R,
    lock: RepoLock,
    index_path: PathBuf,
    options: CacheOptions,
    excerpts: ExcerptMap,
    bugs: HashMap<String, Bug>,
    /// Loaded bug ids, least recently used first.
    recency: VecDeque<String>,
    index_dirty: bool,
}

impl<R: Repository> RepoCache<R> {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Lock the repository and load the excerpt index.
    ///
    /// # Errors
    ///
    /// See [`RepoCache::open_with`].
    pub fn open(repo: R) -> Result<Self> {
        Self::open_with(repo, CacheOptions::default())
    }

    /// Lock the repository and load the excerpt index, rebuilding it from
    /// the store if it is missing or unreadable.
    ///
    /// # Errors
    ///
    /// Returns `LockHeld` if another live process holds the lock, `Storage`
    /// if a rebuild cannot read the store, `Io` if the rebuilt index cannot
    /// be written.
    pub fn open_with(repo: R, options: CacheOptions) -> Result<Self> {
        let private_dir = repo.private_dir();
        let lock = RepoLock::acquire(&private_dir.join(LOCK_FILE))?;
        let index_path = private_dir.join(INDEX_FILE);

        let mut cache = Self {
            repo,
            lock,
            index_path,
            options,
            excerpts: ExcerptMap::new(),
            bugs: HashMap::new(),
            recency: VecDeque::new(),
            index_dirty: false,
        };

        match index::load(&cache.index_path) {
            Ok(excerpts) => {
                tracing::debug!(bugs = excerpts.len(), "loaded excerpt index");
                cache.excerpts = excerpts;
            }
            Err(e) => {
                tracing::info!(reason = %e, "building the excerpt index");
                cache.rebuild_index()?;
            }
        }

        Ok(cache)
    }

    /// Release the repository lock.
    ///
    /// An index left dirty by an interrupted merge stays stale on disk.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the lock file cannot be removed.
    pub fn close(self) -> Result<()> {
        if self.index_dirty {
            tracing::warn!(
                path = %self.index_path.display(),
                "closing with an unflushed excerpt index"
            );
        }
        self.lock.release()
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    // ========================================================================
    // Index
    // ========================================================================

    /// True when the in-memory index has changes not yet written to disk.
    #[must_use]
    pub const fn is_index_dirty(&self) -> bool {
        self.index_dirty
    }

    /// Write the whole excerpt index.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` if the index cannot be written; the index stays dirty.
    pub fn flush_index(&mut self) -> Result<()> {
        index::save(&self.index_path, &self.excerpts)?;
        self.index_dirty = false;
        tracing::debug!(bugs = self.excerpts.len(), "excerpt index written");
        Ok(())
    }

    /// Recompile every bug in the store and rewrite the index.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store cannot be read, `Io` on write failure.
    pub fn rebuild_index(&mut self) -> Result<()> {
        let excerpts = index::rebuild(&self.repo)?;
        tracing::info!(bugs = excerpts.len(), "excerpt index rebuilt");

        self.bugs.retain(|id, _| excerpts.contains_key(id));
        let bugs = &self.bugs;
        self.recency.retain(|id| bugs.contains_key(id));
        self.excerpts = excerpts;
        self.index_dirty = true;
        self.flush_index()
    }

    /// Regenerate the excerpt of a loaded bug and rewrite the index.
    ///
    /// # Panics
    ///
    /// If `id` is not loaded: the cache lost track of its own state.
    pub(crate) fn bug_updated(&mut self, id: &str) -> Result<()> {
        let bug = self
            .bugs
            .get(id)
            .unwrap_or_else(|| panic!("missing bug in the cache: {id}"));
        self.excerpts
            .insert(id.to_string(), BugExcerpt::from_bug(bug));
        self.index_dirty = true;
        self.flush_index()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Every known bug id, in id order.
    #[must_use]
    pub fn all_bug_ids(&self) -> Vec<String> {
        self.excerpts.keys().cloned().collect()
    }

    #[must_use]
    pub fn excerpt(&self, id: &str) -> Option<&BugExcerpt> {
        self.excerpts.get(id)
    }

    /// Ids matching `query`, in its order. Without a query, every id.
    #[must_use]
    pub fn query_bugs(&self, query: Option<&Query>) -> Vec<String> {
        query.map_or_else(|| self.all_bug_ids(), |q| q.run(&self.excerpts))
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a bug by its full id, loading it from the store if needed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the store has no such bug, `InvalidLog` if its
    /// log is malformed.
    pub fn resolve_bug(&mut self, id: &str) -> Result<BugCache<'_, R>> {
        if self.bugs.contains_key(id) {
            self.touch(id);
        } else {
            let bug = Bug::read(&self.repo, id)?;
            if !self.excerpts.contains_key(id) {
                self.excerpts
                    .insert(id.to_string(), BugExcerpt::from_bug(&bug));
                self.index_dirty = true;
                if let Err(e) = self.flush_index() {
                    tracing::warn!(%id, error = %e, "failed to write the excerpt index");
                }
            }
            self.memoize(bug);
        }

        Ok(BugCache {
            cache: self,
            id: id.to_string(),
        })
    }

    /// Resolve a bug by an unambiguous id prefix.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing matches and `AmbiguousId`, listing
    /// every match, when more than one bug does.
    pub fn resolve_bug_prefix(&mut self, prefix: &str) -> Result<BugCache<'_, R>> {
        let matches: Vec<String> = self
            .excerpts
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(id, _)| id.clone())
            .collect();

        match matches.len() {
            0 => Err(BugError::not_found(prefix)),
            1 => {
                let id = matches[0].clone();
                self.resolve_bug(&id)
            }
            _ => Err(BugError::AmbiguousId {
                prefix: prefix.to_string(),
                matches,
            }),
        }
    }

    /// Number of fully loaded bugs held in memory.
    #[must_use]
    pub fn loaded_bug_count(&self) -> usize {
        self.bugs.len()
    }

    /// Drop every loaded bug. The index is untouched.
    pub fn clear_loaded_bugs(&mut self) {
        self.bugs.clear();
        self.recency.clear();
    }

    fn memoize(&mut self, bug: Bug) {
        let id = bug.id().to_string();
        if self.bugs.insert(id.clone(), bug).is_some() {
            self.touch(&id);
        } else {
            self.recency.push_back(id);
        }

        if let Some(max) = self.options.max_loaded_bugs {
            // The newest entry is at the back and is never evicted.
            while self.bugs.len() > max.max(1) {
                let Some(oldest) = self.recency.pop_front() else {
                    break;
                };
                self.bugs.remove(&oldest);
                tracing::trace!(id = %oldest, "evicted loaded bug");
            }
        }
    }

    fn touch(&mut self, id: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == id) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create and commit a new bug authored by the repository's user.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no identity is configured, `Validation` for an
    /// unacceptable title or message, `Storage` if the commit fails.
    pub fn new_bug(&mut self, title: &str, message: &str) -> Result<BugCache<'_, R>> {
        self.new_bug_with_files(title, message, Vec::new())
    }

    /// [`RepoCache::new_bug`] with attached files.
    ///
    /// # Errors
    ///
    /// See [`RepoCache::new_bug`].
    pub fn new_bug_with_files(
        &mut self,
        title: &str,
        message: &str,
        files: Vec<FileHash>,
    ) -> Result<BugCache<'_, R>> {
        let author = self.repo.user_identity()?;
        let mut bug = Bug::create(author, title, message, files)?;
        bug.commit(&mut self.repo)?;

        let id = bug.id().to_string();
        tracing::info!(%id, title, "created bug");
        self.memoize(bug);
        self.bug_updated(&id)?;

        Ok(BugCache { cache: self, id })
    }

    /// Commit one operation on a loaded bug. Nothing changes if the commit fails.
    fn commit_operation(&mut self, id: &str, operation: Operation) -> Result<()> {
        let bug = self
            .bugs
            .get_mut(id)
            .unwrap_or_else(|| panic!("missing bug in the cache: {id}"));

        let mut updated = bug.clone();
        updated.append(operation);
        updated.commit(&mut self.repo)?;
        *bug = updated;

        self.bug_updated(id)
    }

    // ========================================================================
    // Replication
    // ========================================================================

    /// Download `remote`'s bugs into remote-tracking storage.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the transport fails.
    pub fn fetch(&mut self, remote: &str) -> Result<String> {
        tracing::info!(%remote, "fetching bugs");
        self.repo.fetch(remote)
    }

    /// Upload local bugs to `remote`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the transport fails or the remote rejects an update.
    pub fn push(&mut self, remote: &str) -> Result<String> {
        tracing::info!(%remote, "pushing bugs");
        self.repo.push(remote)
    }

    /// Merge every fetched bug of `remote`, one result per bug.
    ///
    /// The index is written once the stream is drained; a write failure is
    /// yielded as a final `IndexPersist` error. Dropping the stream early
    /// leaves the index dirty.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the remote-tracking bugs cannot be listed.
    pub fn merge_all(&mut self, remote: &str) -> Result<MergeAll<'_, R>> {
        let pending = self.repo.list_remote_bugs(remote)?;
        tracing::info!(%remote, bugs = pending.len(), "merging bugs");
        Ok(MergeAll {
            cache: self,
            remote: remote.to_string(),
            pending: pending.into_iter(),
            finished: false,
        })
    }

    fn merge_one(&mut self, remote: &str, id: &str) -> Result<MergeResult> {
        let result = merge::merge_bug(&mut self.repo, remote, id)?;

        if let Some(bug) = &result.bug {
            self.excerpts
                .insert(id.to_string(), BugExcerpt::from_bug(bug));
            self.index_dirty = true;
            if let Some(loaded) = self.bugs.get_mut(id) {
                loaded.clone_from(bug);
            }
        }

        Ok(result)
    }
}

/// Streaming merge of one remote. See [`RepoCache::merge_all`].
pub struct MergeAll<'a, R: Repository> {
    cache: &'a mut RepoCache<R>,
    remote: String,
    pending: std::vec::IntoIter<String>,
    finished: bool,
}

impl<R: Repository> Iterator for MergeAll<'_, R> {
    type Item = Result<MergeResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Some(id) = self.pending.next() {
            return Some(self.cache.merge_one(&self.remote, &id));
        }

        self.finished = true;
        match self.cache.flush_index() {
            Ok(()) => None,
            Err(e) => Some(Err(BugError::IndexPersist {
                source: Box::new(e),
            })),
        }
    }
}

impl<R: Repository> Drop for MergeAll<'_, R> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                remote = %self.remote,
                remaining = self.pending.len(),
                "merge stream dropped before completion, excerpt index not written"
            );
        }
    }
}

/// Handle on one loaded bug. Every mutation commits immediately.
pub struct BugCache<'a, R: Repository> {
    cache: &'a mut RepoCache<R>,
    id: String,
}

impl<R: Repository> std::fmt::Debug for BugCache<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BugCache").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<R: Repository> BugCache<'_, R> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn human_id(&self) -> &str {
        short_id(&self.id, HUMAN_ID_LEN)
    }

    #[must_use]
    pub fn bug(&self) -> &Bug {
        self.cache
            .bugs
            .get(&self.id)
            .unwrap_or_else(|| panic!("missing bug in the cache: {}", self.id))
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.bug().compile()
    }

    /// # Errors
    ///
    /// Returns `Validation` for an empty message, `Storage` if the commit fails.
    pub fn add_comment(&mut self, message: &str) -> Result<()> {
        self.add_comment_with_files(message, Vec::new())
    }

    /// # Errors
    ///
    /// See [`BugCache::add_comment`].
    pub fn add_comment_with_files(&mut self, message: &str, files: Vec<FileHash>) -> Result<()> {
        let author = self.cache.repo.user_identity()?;
        let op = Operation::add_comment(author, message, files)?;
        self.cache.commit_operation(&self.id, op)
    }

    /// # Errors
    ///
    /// Returns `Validation` for an invalid or unchanged title.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let author = self.cache.repo.user_identity()?;
        let was = self.snapshot().title;
        let op = Operation::set_title(author, title, was)?;
        self.cache.commit_operation(&self.id, op)
    }

    /// # Errors
    ///
    /// Returns `NothingToDo` if the bug is already open.
    pub fn open(&mut self) -> Result<()> {
        self.set_status(Status::Open)
    }

    /// # Errors
    ///
    /// Returns `NothingToDo` if the bug is already closed.
    pub fn close(&mut self) -> Result<()> {
        self.set_status(Status::Closed)
    }

    /// # Errors
    ///
    /// Returns `NothingToDo` if the bug already has `status`.
    pub fn set_status(&mut self, status: Status) -> Result<()> {
        if self.snapshot().status == status {
            return Err(BugError::NothingToDo {
                reason: format!("bug {} is already {status}", self.human_id()),
            });
        }
        let author = self.cache.repo.user_identity()?;
        let op = Operation::set_status(author, status)?;
        self.cache.commit_operation(&self.id, op)
    }

    /// Add and remove labels. Labels already in the requested state are ignored.
    ///
    /// Returns the labels actually added and removed.
    ///
    /// # Errors
    ///
    /// Returns `NothingToDo` if no label would change, `Validation` for a
    /// malformed label.
    pub fn change_labels(
        &mut self,
        added: &[String],
        removed: &[String],
    ) -> Result<(Vec<String>, Vec<String>)> {
        let snapshot = self.snapshot();

        let mut to_add: Vec<String> = Vec::new();
        for label in added {
            if !snapshot.has_label(label) && !to_add.contains(label) {
                to_add.push(label.clone());
            }
        }
        let mut to_remove: Vec<String> = Vec::new();
        for label in removed {
            if snapshot.has_label(label) && !to_remove.contains(label) && !to_add.contains(label) {
                to_remove.push(label.clone());
            }
        }

        if to_add.is_empty() && to_remove.is_empty() {
            return Err(BugError::NothingToDo {
                reason: format!("labels of bug {} already up to date", self.human_id()),
            });
        }

        let author = self.cache.repo.user_identity()?;
        let op = Operation::label_change(author, to_add.clone(), to_remove.clone())?;
        self.cache.commit_operation(&self.id, op)?;
        Ok((to_add, to_remove))
    }
}
