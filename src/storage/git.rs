use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, Oid, Signature};
use gitbug_lib::error::{BugError, Result};
use gitbug_lib::model::Person;
use gitbug_lib::operation::Operation;
use gitbug_lib::repository::{LogEntry, Repository};

/// Namespace of local bug references.
pub const BUGS_REF_PREFIX: &str = "refs/bugs/";

/// Blob holding an entry's operations inside each commit tree.
pub const OPS_FILE: &str = "ops.json";

/// Name of the private directory inside `.git`.
const PRIVATE_DIR: &str = "git-bug";

fn git_error(e: git2::Error) -> BugError {
    BugError::storage(e)
}

fn local_ref(id: &str) -> String {
    format!("{BUGS_REF_PREFIX}{id}")
}

fn remote_ref_prefix(remote: &str) -> String {
    format!("refs/remotes/{remote}/bugs/")
}

fn short_oid(oid: Oid) -> String {
    let mut s = oid.to_string();
    s.truncate(7);
    s
}

/// [`Repository`] backed by a git repository through libgit2.
pub struct GitRepository {
    repo: git2::Repository,
}

impl GitRepository {
    /// Open the git repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if `path` is not inside a git repository.
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = git2::Repository::discover(path).map_err(|e| {
            BugError::storage(format!(
                "{} is not inside a git repository: {}",
                path.display(),
                e.message()
            ))
        })?;
        tracing::debug!(git_dir = %repo.path().display(), "opened git repository");
        Ok(Self { repo })
    }

    fn ref_names(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let refs = self
            .repo
            .references_glob(&format!("{prefix}*"))
            .map_err(git_error)?;
        for reference in refs {
            let reference = reference.map_err(git_error)?;
            if let Some(id) = reference.name().and_then(|n| n.strip_prefix(prefix)) {
                names.push(id.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn tip(&self, refname: &str, id: &str) -> Result<Option<Oid>> {
        match self.repo.refname_to_id(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) if e.code() == ErrorCode::InvalidSpec => Err(BugError::not_found(id)),
            Err(e) => Err(git_error(e)),
        }
    }

    /// Walk first parents from `tip` back to the root commit.
    fn read_chain(&self, id: &str, tip: Oid) -> Result<Vec<LogEntry>> {
        let invalid = |reason: String| BugError::InvalidLog {
            id: id.to_string(),
            reason,
        };

        let mut entries = Vec::new();
        let mut next = Some(tip);
        while let Some(oid) = next {
            let commit = self.repo.find_commit(oid).map_err(git_error)?;
            let tree = commit.tree().map_err(git_error)?;
            let entry = tree
                .get_name(OPS_FILE)
                .ok_or_else(|| invalid(format!("commit {} has no {OPS_FILE}", short_oid(oid))))?;
            let blob = self.repo.find_blob(entry.id()).map_err(git_error)?;
            let operations: Vec<Operation> = serde_json::from_slice(blob.content())
                .map_err(|e| invalid(format!("commit {}: {e}", short_oid(oid))))?;

            entries.push(LogEntry {
                hash: oid.to_string(),
                operations,
            });
            next = if commit.parent_count() == 0 {
                None
            } else {
                Some(commit.parent_id(0).map_err(git_error)?)
            };
        }

        entries.reverse();
        Ok(entries)
    }

    fn callbacks<'a>(&self) -> git2::RemoteCallbacks<'a> {
        let cfg = self.repo.config().ok();
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            if allowed.is_ssh_key() {
                if let Some(user) = username_from_url {
                    return git2::Cred::ssh_key_from_agent(user);
                }
            }
            if allowed.is_user_pass_plaintext() {
                if let Some(ref cfg) = cfg {
                    if let Ok(cred) = git2::Cred::credential_helper(cfg, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }
            git2::Cred::default()
        });
        callbacks
    }
}

impl Repository for GitRepository {
    fn private_dir(&self) -> PathBuf {
        dunce::simplified(&self.repo.path().join(PRIVATE_DIR)).to_path_buf()
    }

    fn user_identity(&self) -> Result<Person> {
        let config = self.repo.config().map_err(git_error)?;
        let name = config.get_string("user.name").map_err(|_| {
            BugError::Config("user.name is not set (git config user.name \"Your Name\")".to_string())
        })?;
        let email = config.get_string("user.email").unwrap_or_default();
        Ok(Person::new(name, email))
    }

    fn list_bugs(&self) -> Result<Vec<String>> {
        self.ref_names(BUGS_REF_PREFIX)
    }

    fn read_log(&self, id: &str) -> Result<Vec<LogEntry>> {
        let tip = self
            .tip(&local_ref(id), id)?
            .ok_or_else(|| BugError::not_found(id))?;
        self.read_chain(id, tip)
    }

    fn append_entry(&mut self, id: &str, operations: &[Operation]) -> Result<LogEntry> {
        let refname = local_ref(id);
        let parent = self
            .tip(&refname, id)?
            .map(|oid| self.repo.find_commit(oid))
            .transpose()
            .map_err(git_error)?;

        let data = serde_json::to_vec_pretty(operations)?;
        let blob = self.repo.blob(&data).map_err(git_error)?;
        let mut builder = self.repo.treebuilder(None).map_err(git_error)?;
        builder.insert(OPS_FILE, blob, 0o100_644).map_err(git_error)?;
        let tree_oid = builder.write().map_err(git_error)?;
        let tree = self.repo.find_tree(tree_oid).map_err(git_error)?;

        let author = operations
            .first()
            .map_or_else(Person::default, |op| op.author.clone());
        let sig = match author.name.as_str() {
            "" => Signature::now("git-bug", "git-bug@localhost"),
            name => Signature::now(name, &author.email),
        }
        .map_err(git_error)?;

        let kinds: Vec<&str> = operations.iter().map(|op| op.kind().as_str()).collect();
        let message = kinds.join(", ");
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some(&refname), &sig, &sig, &message, &tree, &parents)
            .map_err(git_error)?;

        Ok(LogEntry {
            hash: oid.to_string(),
            operations: operations.to_vec(),
        })
    }

    fn list_remote_bugs(&self, remote: &str) -> Result<Vec<String>> {
        self.ref_names(&remote_ref_prefix(remote))
    }

    fn read_remote_log(&self, remote: &str, id: &str) -> Result<Vec<LogEntry>> {
        let refname = format!("{}{id}", remote_ref_prefix(remote));
        let tip = self
            .tip(&refname, id)?
            .ok_or_else(|| BugError::not_found(id))?;
        self.read_chain(id, tip)
    }

    fn import_remote_log(&mut self, remote: &str, id: &str) -> Result<()> {
        let refname = format!("{}{id}", remote_ref_prefix(remote));
        let tip = self
            .tip(&refname, id)?
            .ok_or_else(|| BugError::not_found(id))?;
        self.repo
            .reference(&local_ref(id), tip, true, &format!("git-bug: merge from {remote}"))
            .map_err(git_error)?;
        Ok(())
    }

    fn fetch(&mut self, remote: &str) -> Result<String> {
        let mut git_remote = self.repo.find_remote(remote).map_err(git_error)?;
        let refspec = format!("+{BUGS_REF_PREFIX}*:{}*", remote_ref_prefix(remote));
        let updates: RefCell<String> = RefCell::new(String::new());

        {
            let mut callbacks = self.callbacks();
            callbacks.update_tips(|refname, old, new| {
                let mut out = updates.borrow_mut();
                if old.is_zero() {
                    let _ = writeln!(out, " * [new bug]         {refname}");
                } else {
                    let _ = writeln!(
                        out,
                        "   {}..{}  {refname}",
                        short_oid(old),
                        short_oid(new)
                    );
                }
                true
            });
            let mut fo = git2::FetchOptions::new();
            fo.remote_callbacks(callbacks);
            git_remote
                .fetch(&[refspec.as_str()], Some(&mut fo), None)
                .map_err(git_error)?;
        }

        let mut transcript = updates.into_inner();
        if transcript.is_empty() {
            transcript.push_str("Already up to date.\n");
        }
        Ok(transcript)
    }

    fn push(&mut self, remote: &str) -> Result<String> {
        let mut git_remote = self.repo.find_remote(remote).map_err(git_error)?;
        let refspecs: Vec<String> = self
            .list_bugs()?
            .iter()
            .map(|id| format!("{0}:{0}", local_ref(id)))
            .collect();
        if refspecs.is_empty() {
            return Ok("Everything up-to-date\n".to_string());
        }

        let rejected: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let pushed: RefCell<String> = RefCell::new(String::new());
        {
            let mut callbacks = self.callbacks();
            callbacks.push_update_reference(|refname, status| {
                match status {
                    Some(msg) => rejected.borrow_mut().push(format!("{refname} ({msg})")),
                    None => {
                        let _ = writeln!(pushed.borrow_mut(), "   pushed  {refname}");
                    }
                }
                Ok(())
            });
            let mut po = git2::PushOptions::new();
            po.remote_callbacks(callbacks);
            git_remote
                .push(&refspecs, Some(&mut po))
                .map_err(git_error)?;
        }

        let rejected = rejected.into_inner();
        if !rejected.is_empty() {
            return Err(BugError::storage(format!(
                "push rejected for {}",
                rejected.join(", ")
            )));
        }

        let mut transcript = pushed.into_inner();
        if transcript.is_empty() {
            transcript.push_str("Everything up-to-date\n");
        }
        Ok(transcript)
    }
}
