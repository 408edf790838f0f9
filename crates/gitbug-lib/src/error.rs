//! Error types for `gitbug-lib`.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for gitbug-lib operations.
#[derive(Error, Debug)]
pub enum BugError {
    // === Bug Errors ===
    /// No bug with the specified ID (or prefix) exists.
    #[error("Bug not found: {id}")]
    NotFound { id: String },

    /// Partial ID matches multiple bugs.
    #[error("Ambiguous ID '{prefix}': matches {matches:?}")]
    AmbiguousId {
        prefix: String,
        matches: Vec<String>,
    },

    /// A new bug's id is already taken by a stored log.
    #[error("Bug already exists: {id}")]
    AlreadyExists { id: String },

    /// A stored operation log breaks the log invariants.
    #[error("Invalid log for {id}: {reason}")]
    InvalidLog { id: String, reason: String },

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Query string could not be parsed.
    #[error("Invalid query '{input}': {reason}")]
    QueryParse { input: String, reason: String },

    // === Lock Errors ===
    /// Another live process holds the repository lock.
    #[error(
        "the repository is already locked by the process pid {pid} (lock file: {})",
        path.display()
    )]
    LockHeld { pid: u32, path: PathBuf },

    /// The lock file exists but does not hold a process id.
    #[error("Invalid lock file {}: {reason}", path.display())]
    InvalidLock { path: PathBuf, reason: String },

    // === Index Errors ===
    /// The persisted excerpt index could not be decoded.
    ///
    /// Handled inside the cache by rebuilding; never returned from `RepoCache::open`.
    #[error("Excerpt index is corrupt: {0}")]
    IndexCorrupt(String),

    /// The excerpt index could not be written after a merge batch.
    ///
    /// Results already yielded remain valid; the on-disk index is stale until
    /// `RepoCache::flush_index` succeeds.
    #[error("Failed to persist excerpt index, it may be stale: {source}")]
    IndexPersist {
        #[source]
        source: Box<BugError>,
    },

    // === Configuration Errors ===
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // === Storage Errors ===
    /// The collaborator store failed a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Operational Errors ===
    /// The request had no effect.
    #[error("Nothing to do: {reason}")]
    NothingToDo { reason: String },
}

impl BugError {
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// True when the error means the requested bug does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type using `BugError`.
pub type Result<T> = std::result::Result<T, BugError>;
