use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use assert_cmd::Command;
use tempfile::TempDir;

/// A throwaway git repository with an identity configured.
pub struct BugWorkspace {
    _temp: TempDir,
    pub root: PathBuf,
    pub home: PathBuf,
}

impl BugWorkspace {
    pub fn new() -> Self {
        Self::with_user("Test User", "test@example.com")
    }

    pub fn with_user(name: &str, email: &str) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("repo");
        let home = temp.path().join("home");
        std::fs::create_dir_all(&home).expect("home dir");

        let repo = git2::Repository::init(&root).expect("git init");
        let mut config = repo.config().expect("git config");
        config.set_str("user.name", name).expect("user.name");
        config.set_str("user.email", email).expect("user.email");

        Self {
            _temp: temp,
            root,
            home,
        }
    }

    /// Register `path` as remote `name`.
    pub fn add_remote(&self, name: &str, path: &Path) {
        let repo = git2::Repository::open(&self.root).expect("open repo");
        let url = path.to_str().expect("utf-8 path");
        repo.remote(name, url).expect("add remote");
    }
}

/// A bare repository acting as the shared remote.
pub fn bare_remote(dir: &Path) -> PathBuf {
    let path = dir.join("remote.git");
    git2::Repository::init_bare(&path).expect("init bare");
    path
}

pub struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

pub fn run_bug<I, S>(workspace: &BugWorkspace, args: I, label: &str) -> CmdOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::cargo_bin("git-bug").expect("git-bug binary");
    cmd.current_dir(&workspace.root)
        .args(args)
        .env("HOME", &workspace.home)
        .env("XDG_CONFIG_HOME", workspace.home.join(".config"))
        .env_remove("GITBUG_LOG")
        .env_remove("GITBUG_REMOTE")
        .env_remove("GITBUG_MAX_LOADED_BUGS");

    let output = cmd.output().expect("run git-bug");
    let result = CmdOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !result.status.success() {
        eprintln!("[{label}] stderr:\n{}", result.stderr);
    }
    result
}

/// Create a bug and return the short id printed by `new`.
pub fn new_bug(workspace: &BugWorkspace, title: &str, message: &str) -> String {
    let output = run_bug(workspace, ["new", "-t", title, "-m", message], "new");
    assert!(output.status.success(), "new failed: {}", output.stderr);
    output
        .stdout
        .split_whitespace()
        .next()
        .expect("short id in output")
        .to_string()
}
