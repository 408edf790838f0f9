//! `git-bug` - distributed issue tracker embedded in git.
//!
//! Bugs are stored as chains of commits under `refs/bugs/*` and shared with
//! plain `git fetch`/`git push`; there is no server.

use gitbug::run;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
