//! `gitbug-lib` - event-sourced issue tracking over a version-control store.
//!
//! Each bug is an append-only log of operations. Its current state is a
//! [`Snapshot`] obtained by folding the log; a compact [`BugExcerpt`] of every
//! bug is kept in a persisted index so listing and querying never replay logs.
//! [`RepoCache`] ties it together: it locks the repository, resolves bugs
//! lazily and merges logs fetched from remotes.
//!
//! # Quick Start
//!
//! ```no_run
//! use gitbug_lib::{MemoryRepository, Person, Query, RepoCache};
//!
//! let mut repo = MemoryRepository::new("/tmp/gitbug-private");
//! repo.set_identity(Person::new("Ada", "ada@example.com"));
//!
//! let mut cache = RepoCache::open(repo).unwrap();
//!
//! // Create
//! let id = cache.new_bug("Crash on start", "It crashes.").unwrap().id().to_string();
//!
//! // Mutate
//! cache.resolve_bug_prefix(&id[..7]).unwrap().add_comment("Still crashing").unwrap();
//!
//! // Query
//! let open = cache.query_bugs(Some(&Query::parse("status:open sort:creation").unwrap()));
//! assert_eq!(open, vec![id]);
//!
//! cache.close().unwrap();
//! ```

pub mod bug;
pub mod cache;
pub mod error;
pub mod excerpt;
pub mod index;
pub mod lock;
pub mod merge;
pub mod model;
pub mod operation;
pub mod query;
pub mod repository;

pub use bug::{Bug, HUMAN_ID_LEN};
pub use cache::{BugCache, CacheOptions, MergeAll, RepoCache};
pub use error::{BugError, Result};
pub use excerpt::BugExcerpt;
pub use merge::{MergeResult, MergeStatus};
pub use model::{Comment, FileHash, Person, Snapshot, Status};
pub use operation::{OpPayload, Operation, OperationKind};
pub use query::{Filters, OrderBy, OrderDirection, Query};
pub use repository::{LogEntry, MemoryRepository, Repository};
