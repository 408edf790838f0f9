//! Git-backed collaborator store for `gitbug`.
//!
//! Every bug is a chain of commits under `refs/bugs/<id>`; each commit is
//! one log entry and carries its operations in an `ops.json` blob. Fetched
//! bugs land under `refs/remotes/<remote>/bugs/<id>` until merged.

mod git;

pub use git::{BUGS_REF_PREFIX, GitRepository, OPS_FILE};
