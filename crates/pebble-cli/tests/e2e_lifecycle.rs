//! E2E lifecycle tests: add, show, start, end, backlog, tag, untag, rm.
//!
//! Each test runs `pb` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// Build a Command targeting the pb binary, rooted in `dir`.
fn pb_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pb"));
    cmd.current_dir(dir);
    // Keep the credentials file inside the test directory.
    cmd.env("HOME", dir);
    cmd.env("XDG_CONFIG_HOME", dir.join("config"));
    // Suppress tracing output that goes to stderr
    cmd.env("PEBBLE_LOG", "error");
    cmd
}

/// Add an entry and assert the confirmation line.
fn add_entry(dir: &Path, tags: &str, msg: &str) {
    pb_cmd(dir)
        .args(["add", tags, msg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));
}

#[test]
fn first_run_creates_the_database() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created pm.db"))
        .stdout(predicate::str::contains("0 open / 0 total"));

    assert!(dir.path().join("pm.db").is_file());

    // Second run opens the existing file silently.
    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created pm.db").not());
}

#[test]
fn bare_invocation_lists_entries() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    pb_cmd(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Fix the login"))
        .stdout(predicate::str::contains("1 open / 1 total"));
}

#[test]
fn add_then_show_lists_the_entry() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["add", "bug", "Fix the login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 0001: Fix the login"));

    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0001"))
        .stdout(predicate::str::contains("bug"))
        .stdout(predicate::str::contains("Fix the login"))
        .stdout(predicate::str::contains("1 open / 1 total"));
}

#[test]
fn show_by_id_prints_the_full_view() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug,api", "Fix the login\n\nSteps to reproduce: log in twice.");

    pb_cmd(dir.path())
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0001 | api,bug |"))
        .stdout(predicate::str::contains("Steps to reproduce"))
        .stdout(predicate::str::contains("history:"));
}

#[test]
fn show_filters_by_tag() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");
    add_entry(dir.path(), "docs", "Write the README");

    pb_cmd(dir.path())
        .args(["show", "bug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fix the login"))
        .stdout(predicate::str::contains("Write the README").not());
}

#[test]
fn full_lifecycle_start_end_backlog() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    pb_cmd(dir.path())
        .args(["start", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started 0001"));

    // Doing entries still count as open.
    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 open / 1 total"));

    pb_cmd(dir.path())
        .args(["end", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ended 0001"));

    // Finished entries drop out of the default listing.
    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 open / 1 total"))
        .stdout(predicate::str::contains("Fix the login").not());

    // But reappear with --all, with the finish date marked.
    pb_cmd(dir.path())
        .args(["show", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fix the login"))
        .stdout(predicate::str::contains(" -> "));

    pb_cmd(dir.path())
        .args(["backlog", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 0001 to backlog"));

    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 open / 1 total"));
}

#[test]
fn missing_ids_get_a_soft_message() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    for args in [
        vec!["show", "42"],
        vec!["start", "42"],
        vec!["end", "42"],
        vec!["backlog", "42"],
        vec!["rm", "42"],
        vec!["tag", "urgent", "42"],
        vec!["untag", "urgent", "42"],
    ] {
        pb_cmd(dir.path())
            .args(&args)
            .assert()
            .success()
            .stdout(predicate::str::contains("0042 doesn't exist"));
    }
}

#[test]
fn tagging_and_untagging() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    pb_cmd(dir.path())
        .args(["tag", "urgent", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tagged 0001 with urgent"));

    pb_cmd(dir.path())
        .args(["tag", "urgent", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0001 already tagged with urgent"));

    pb_cmd(dir.path())
        .args(["untag", "urgent", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Untagged 0001 with urgent"));

    pb_cmd(dir.path())
        .args(["untag", "urgent", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0001 wasn't tagged with urgent"));
}

#[test]
fn tags_histogram_counts_entries() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");
    add_entry(dir.path(), "bug,api", "Rework token refresh");
    add_entry(dir.path(), "api", "Document the endpoints");

    pb_cmd(dir.path())
        .args(["tags"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bug - 2"))
        .stdout(predicate::str::contains("api - 2"));
}

#[test]
fn rm_deletes_locally() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    pb_cmd(dir.path())
        .args(["rm", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 0001"));

    pb_cmd(dir.path())
        .args(["rm", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0001 doesn't exist"));

    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 open / 0 total"));
}

#[test]
fn points_show_in_the_listing() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["add", "api", "Rework token refresh", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 0001"));

    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(3)"));
}

#[test]
fn deadlines_parse_or_complain() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    pb_cmd(dir.path())
        .args(["start", "1", "tomorrow"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Couldn't read deadline 'tomorrow'"));

    pb_cmd(dir.path())
        .args(["start", "1", "3d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started 0001, due "));

    pb_cmd(dir.path())
        .args(["show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("due in"));
}

#[test]
fn feature_tags_group_the_listing() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "auth", "Rework token refresh");
    add_entry(dir.path(), "docs", "Write the README");

    pb_cmd(dir.path())
        .args(["feature", "add", "auth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added feature auth"));

    // The feature tag becomes a heading instead of an inline tag.
    let output = pb_cmd(dir.path()).args(["show"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let heading_at = stdout.find("auth:").expect("feature heading");
    let member_at = stdout.find("Rework token refresh").expect("member line");
    let loose_at = stdout.find("Write the README").expect("loose line");
    assert!(loose_at < heading_at, "loose entries print before features");
    assert!(heading_at < member_at, "members print under their heading");

    pb_cmd(dir.path())
        .args(["feature", "rm", "auth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed feature auth"));
}

#[cfg(unix)]
#[test]
fn edit_keeps_the_message_with_a_noop_editor() {
    let dir = TempDir::new().unwrap();
    add_entry(dir.path(), "bug", "Fix the login");

    // `true` exits without touching the buffer, so the message survives.
    pb_cmd(dir.path())
        .env("EDITOR", "true")
        .args(["edit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modified 0001: Fix the login"));
}
