mod common;
use common::cli::{BugWorkspace, bare_remote, new_bug, run_bug};

#[test]
fn test_push_then_pull_reports_new_bug() {
    let shared = tempfile::tempdir().unwrap();
    let remote = bare_remote(shared.path());

    let alice = BugWorkspace::with_user("Alice", "alice@example.com");
    let bob = BugWorkspace::with_user("Bob", "bob@example.com");
    alice.add_remote("origin", &remote);
    bob.add_remote("origin", &remote);

    let id = new_bug(&alice, "Shared bug", "Seen by both");
    let push = run_bug(&alice, ["push"], "push");
    assert!(push.status.success());

    let pull = run_bug(&bob, ["pull"], "pull");
    assert!(pull.status.success());
    assert!(pull.stdout.contains("Merging data ..."));
    assert!(pull.stdout.contains(&format!("{id}: new")));

    let show = run_bug(&bob, ["show", id.as_str()], "show");
    assert!(show.status.success());
    assert!(show.stdout.contains("Alice <alice@example.com>"));

    // A second pull has nothing to import.
    let again = run_bug(&bob, ["pull", "--json"], "pull_again");
    assert!(again.status.success());
    let results: Vec<serde_json::Value> = serde_json::from_str(&again.stdout).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_pull_fast_forwards_comments() {
    let shared = tempfile::tempdir().unwrap();
    let remote = bare_remote(shared.path());

    let alice = BugWorkspace::with_user("Alice", "alice@example.com");
    let bob = BugWorkspace::with_user("Bob", "bob@example.com");
    alice.add_remote("origin", &remote);
    bob.add_remote("origin", &remote);

    let id = new_bug(&alice, "Shared bug", "first");
    assert!(run_bug(&alice, ["push"], "push").status.success());
    assert!(run_bug(&bob, ["pull"], "pull").status.success());

    let comment = run_bug(&alice, ["comment", id.as_str(), "-m", "second"], "comment");
    assert!(comment.status.success());
    assert!(run_bug(&alice, ["push"], "push_again").status.success());

    let pull = run_bug(&bob, ["pull"], "pull_update");
    assert!(pull.status.success());
    assert!(pull.stdout.contains(&format!("{id}: updated")));

    let show = run_bug(&bob, ["show", id.as_str()], "show");
    assert!(show.stdout.contains("second"));
}

#[test]
fn test_pull_from_unknown_remote_fails() {
    let workspace = BugWorkspace::new();
    let pull = run_bug(&workspace, ["pull", "nowhere"], "pull_unknown");
    assert!(!pull.status.success());
    assert!(pull.stderr.contains("Error:"));
}
