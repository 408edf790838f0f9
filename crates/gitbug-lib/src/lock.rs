//! Advisory, process-scoped repository lock.
//!
//! The lock is a file holding the owner's process id, created with
//! exclusive-create so two processes cannot both create it. A lock whose
//! owner is no longer running is treated as left over from a crash and
//! removed. Between reading a stale pid and removing the file, another
//! process may do the same and create a fresh lock that this process then
//! deletes; that window remains.
//!
//! An empty lock file is either being written by its creator right now or
//! was left by a crash between creating and writing it. It is re-read a few
//! times; if it stays empty it is treated like a stale lock and removed.
//!
//! The liveness probe assumes the file system is not shared between hosts.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{BugError, Result};

/// File name of the lock inside the repository-private directory.
pub const LOCK_FILE: &str = "lock";

/// Longest pid accepted in a lock file.
const MAX_PID_BYTES: u64 = 10;

/// Re-reads of an empty lock file before it counts as abandoned.
const EMPTY_LOCK_READS: u32 = 5;
const EMPTY_LOCK_WAIT: Duration = Duration::from_millis(20);

/// What a lock file says about its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    /// The file disappeared before it could be read.
    Gone,
    /// The file exists but holds no pid yet.
    Empty,
    Pid(u32),
}

/// Held repository lock. Released on [`RepoLock::release`] or drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    released: bool,
}

impl RepoLock {
    /// Acquire the lock at `path`, clearing it first if its owner is gone.
    ///
    /// # Errors
    ///
    /// Returns `LockHeld` if a live process owns the lock, `InvalidLock` if
    /// the lock file is unreadable as a pid, `Io` on file system errors.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if try_create(path)? {
            return Ok(Self::held(path));
        }

        match read_settled_holder(path)? {
            Holder::Gone => {}
            Holder::Pid(pid) if is_process_alive(pid) => {
                return Err(BugError::LockHeld {
                    pid,
                    path: path.to_path_buf(),
                });
            }
            Holder::Pid(pid) => {
                tracing::warn!(
                    pid,
                    path = %path.display(),
                    "a lock file is present but the corresponding process is not, removing it"
                );
                remove_stale(path)?;
            }
            Holder::Empty => {
                tracing::warn!(path = %path.display(), "the lock file stayed empty, removing it");
                remove_stale(path)?;
            }
        }

        if try_create(path)? {
            return Ok(Self::held(path));
        }

        // Someone else created it between our cleanup and retry.
        let pid = match read_holder(path)? {
            Holder::Pid(pid) => pid,
            Holder::Gone | Holder::Empty => 0,
        };
        Err(BugError::LockHeld {
            pid,
            path: path.to_path_buf(),
        })
    }

    fn held(path: &Path) -> Self {
        tracing::debug!(path = %path.display(), pid = std::process::id(), "repository locked");
        Self {
            path: path.to_path_buf(),
            released: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock by removing the lock file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be removed.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Create the lock file holding our pid. `Ok(false)` if it already exists.
fn try_create(path: &Path) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(std::process::id().to_string().as_bytes())?;
    file.flush()?;
    Ok(true)
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Like [`read_holder`], giving a creator that has not written its pid yet
/// a moment to do so.
fn read_settled_holder(path: &Path) -> Result<Holder> {
    let mut holder = read_holder(path)?;
    for _ in 1..EMPTY_LOCK_READS {
        if holder != Holder::Empty {
            break;
        }
        thread::sleep(EMPTY_LOCK_WAIT);
        holder = read_holder(path)?;
    }
    Ok(holder)
}

/// Owner recorded in the lock file.
fn read_holder(path: &Path) -> Result<Holder> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Holder::Gone),
        Err(e) => return Err(e.into()),
    };

    let mut buf = String::new();
    file.take(MAX_PID_BYTES).read_to_string(&mut buf).map_err(|e| {
        BugError::InvalidLock {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    if buf.len() as u64 >= MAX_PID_BYTES {
        return Err(BugError::InvalidLock {
            path: path.to_path_buf(),
            reason: format!("the lock file should be < {MAX_PID_BYTES} bytes"),
        });
    }

    let buf = buf.trim();
    if buf.is_empty() {
        return Ok(Holder::Empty);
    }
    buf.parse::<u32>()
        .map(Holder::Pid)
        .map_err(|e| BugError::InvalidLock {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Check if a process with the given PID is still alive.
///
/// On Linux, uses /proc/{pid}/stat to check process existence.
/// On other Unix systems, asks `kill -0`.
/// On non-Unix systems, conservatively assumes the process is alive.
#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    pid == std::process::id() || Path::new(&format!("/proc/{pid}/stat")).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
