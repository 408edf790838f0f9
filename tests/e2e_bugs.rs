mod common;
use common::cli::{BugWorkspace, new_bug, run_bug};

#[test]
fn test_new_then_ls_and_show() {
    let workspace = BugWorkspace::new();
    let id = new_bug(&workspace, "Crash on start", "It crashes every time.");
    assert_eq!(id.len(), 7);

    let ls = run_bug(&workspace, ["ls"], "ls");
    assert!(ls.status.success());
    assert!(ls.stdout.contains(&id));
    assert!(ls.stdout.contains("Crash on start"));

    let show = run_bug(&workspace, ["show", id.as_str()], "show");
    assert!(show.status.success());
    assert!(show.stdout.contains("Crash on start"));
    assert!(show.stdout.contains("Test User <test@example.com>"));
    assert!(show.stdout.contains("It crashes every time."));
}

#[test]
fn test_ls_empty_repository() {
    let workspace = BugWorkspace::new();
    let ls = run_bug(&workspace, ["ls"], "ls");
    assert!(ls.status.success());
    assert!(ls.stdout.contains("No bugs found."));
}

#[test]
fn test_comment_appears_in_show() {
    let workspace = BugWorkspace::new();
    let id = new_bug(&workspace, "Slow search", "Takes seconds.");

    let comment = run_bug(
        &workspace,
        ["comment", id.as_str(), "-m", "Reproduced on 1.2"],
        "comment",
    );
    assert!(comment.status.success());

    let show = run_bug(&workspace, ["show", id.as_str(), "--json"], "show");
    assert!(show.status.success());
    let details: serde_json::Value = serde_json::from_str(&show.stdout).expect("json");
    let comments = details["comments"].as_array().expect("comments");
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[1]["message"], "Reproduced on 1.2");
}

#[test]
fn test_close_and_filter_by_status() {
    let workspace = BugWorkspace::new();
    let first = new_bug(&workspace, "First", "one");
    let second = new_bug(&workspace, "Second", "two");

    let close = run_bug(&workspace, ["close", first.as_str()], "close");
    assert!(close.status.success());

    let closed = run_bug(&workspace, ["ls", "status:closed"], "ls_closed");
    assert!(closed.status.success());
    assert!(closed.stdout.contains(&first));
    assert!(!closed.stdout.contains(&second));

    let open = run_bug(&workspace, ["ls", "status:open", "--json"], "ls_open");
    let bugs: Vec<serde_json::Value> = serde_json::from_str(&open.stdout).expect("json");
    assert_eq!(bugs.len(), 1);
    assert_eq!(bugs[0]["title"], "Second");
    assert_eq!(bugs[0]["status"], "open");
}

#[test]
fn test_labels_and_title() {
    let workspace = BugWorkspace::new();
    let id = new_bug(&workspace, "Typo", "In the README");

    let label = run_bug(&workspace, ["label", id.as_str(), "docs", "+easy"], "label");
    assert!(label.status.success());

    let unlabel = run_bug(&workspace, ["label", id.as_str(), "-easy"], "unlabel");
    assert!(unlabel.status.success());

    let title = run_bug(&workspace, ["title", id.as_str(), "Typo in README"], "title");
    assert!(title.status.success());

    let ls = run_bug(&workspace, ["ls", "label:docs"], "ls_label");
    assert!(ls.stdout.contains("Typo in README [docs]"));
    let ls = run_bug(&workspace, ["ls", "label:easy"], "ls_easy");
    assert!(ls.stdout.contains("No bugs found."));
}

#[test]
fn test_unknown_and_ambiguous_ids_fail() {
    let workspace = BugWorkspace::new();
    new_bug(&workspace, "First", "one");
    new_bug(&workspace, "Second", "two");

    let unknown = run_bug(&workspace, ["show", "zzzzzzz"], "show_unknown");
    assert!(!unknown.status.success());
    assert!(unknown.stderr.contains("Bug not found"));

    let ambiguous = run_bug(&workspace, ["show", ""], "show_ambiguous");
    assert!(!ambiguous.status.success());
    assert!(ambiguous.stderr.contains("Ambiguous ID"));
}

#[test]
fn test_bad_query_fails() {
    let workspace = BugWorkspace::new();
    let ls = run_bug(&workspace, ["ls", "sort:priority"], "ls_bad");
    assert!(!ls.status.success());
    assert!(ls.stderr.contains("Invalid query"));
}

#[test]
fn test_rebuild_cache_after_deleting_index() {
    let workspace = BugWorkspace::new();
    let id = new_bug(&workspace, "Lost index", "gone");

    let index = workspace.root.join(".git/git-bug/excerpts.json");
    assert!(index.exists());
    std::fs::remove_file(&index).unwrap();

    let ls = run_bug(&workspace, ["ls"], "ls_rebuilt");
    assert!(ls.status.success());
    assert!(ls.stdout.contains(&id));

    let rebuild = run_bug(&workspace, ["rebuild-cache"], "rebuild");
    assert!(rebuild.status.success());
    assert!(rebuild.stdout.contains("1 bug(s)"));
}

#[test]
fn test_outside_a_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("git-bug").unwrap();
    cmd.current_dir(dir.path())
        .arg("ls")
        .assert()
        .failure()
        .stderr(predicates::str::contains("Error:"));
}

#[test]
fn test_configured_id_length_is_used_everywhere() {
    let workspace = BugWorkspace::new();
    let private = workspace.root.join(".git/git-bug");
    std::fs::create_dir_all(&private).unwrap();
    std::fs::write(private.join("config.yaml"), "id_length: 10\n").unwrap();

    let id = new_bug(&workspace, "Long ids", "ten characters");
    assert_eq!(id.len(), 10);

    let ls = run_bug(&workspace, ["ls"], "ls");
    assert!(ls.stdout.contains(&format!(" {id} Long ids")));

    let show = run_bug(&workspace, ["show", &id[..4]], "show");
    assert!(show.status.success());
    assert!(show.stdout.starts_with(&format!("○ {id} Long ids")));

    let close = run_bug(&workspace, ["close", id.as_str()], "close");
    assert!(close.stdout.contains(&format!("{id} is now closed")));
}
