//! Persisted excerpt index.
//!
//! The whole index is one JSON document rewritten wholesale on every change.
//! Anything that prevents loading it (missing file, bad JSON, unknown format
//! version) is reported so the cache can fall back to a full rebuild.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bug::Bug;
use crate::error::{BugError, Result};
use crate::excerpt::BugExcerpt;
use crate::repository::Repository;

/// File name of the index inside the repository-private directory.
pub const INDEX_FILE: &str = "excerpts.json";

const FORMAT_VERSION: u32 = 1;

/// In-memory form of the index, keyed by bug id.
pub type ExcerptMap = BTreeMap<String, BugExcerpt>;

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    excerpts: ExcerptMap,
}

/// Load the index.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `IndexCorrupt` if it cannot
/// be decoded or was written by another format version.
pub fn load(path: &Path) -> Result<ExcerptMap> {
    let data = fs::read(path)?;
    let file: IndexFile =
        serde_json::from_slice(&data).map_err(|e| BugError::IndexCorrupt(e.to_string()))?;

    if file.version != FORMAT_VERSION {
        return Err(BugError::IndexCorrupt(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            file.version
        )));
    }

    for (id, excerpt) in &file.excerpts {
        if id != &excerpt.id {
            return Err(BugError::IndexCorrupt(format!(
                "entry {id} holds excerpt for {}",
                excerpt.id
            )));
        }
    }

    Ok(file.excerpts)
}

/// Write the whole index with write-to-temp + rename.
///
/// # Errors
///
/// Returns `Io` or `Json` if the file cannot be written.
pub fn save(path: &Path, excerpts: &ExcerptMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = IndexFile {
        version: FORMAT_VERSION,
        excerpts: excerpts.clone(),
    };
    let data = serde_json::to_vec(&file)?;

    let tmp_path = path.with_extension("json.tmp");
    let mut tmp = fs::File::create(&tmp_path)?;
    tmp.write_all(&data)?;
    tmp.flush()?;
    drop(tmp);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Rebuild the index by compiling every durable log in the store.
///
/// Logs that fail validation are skipped with a warning.
///
/// # Errors
///
/// Returns `Storage` if the store cannot be listed or read.
pub fn rebuild<R: Repository + ?Sized>(repo: &R) -> Result<ExcerptMap> {
    let mut excerpts = ExcerptMap::new();

    for id in repo.list_bugs()? {
        match Bug::read(repo, &id) {
            Ok(bug) => {
                excerpts.insert(id, BugExcerpt::from_bug(&bug));
            }
            Err(BugError::InvalidLog { id, reason }) => {
                tracing::warn!(%id, %reason, "skipping invalid bug log");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(excerpts)
}
