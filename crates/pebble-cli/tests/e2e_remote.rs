//! E2E tests for `pb remote` and `pb sync`, all offline.
//!
//! Attaching and detaching only touch local config and the token file, so
//! these tests never reach the network; nothing here runs a command that
//! would trigger a sync against the configured remote.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn pb_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pb"));
    cmd.current_dir(dir);
    cmd.env("HOME", dir);
    cmd.env("XDG_CONFIG_HOME", dir.join("config"));
    cmd.env("PEBBLE_LOG", "error");
    cmd
}

#[test]
fn sync_without_a_remote_points_at_setup() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No remote backend configured - try `pb remote add github`",
        ));
}

#[test]
fn attach_and_detach_github() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["remote", "add", "github"])
        .write_stdin("hobbit\nsecret-token\nshire/pebble\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Enter the GitHub user for API access"))
        .stdout(predicate::str::contains("Attached github remote"));

    // The token never lands in the database directory.
    #[cfg(target_os = "linux")]
    {
        let tokens = dir.path().join("config/pebble/github-tokens");
        let content = fs::read_to_string(&tokens).expect("token file written");
        assert!(content.contains("=secret-token"));
        let db = fs::read(dir.path().join("pm.db")).expect("database exists");
        assert!(!contains_slice(&db, b"secret-token"));
    }

    pb_cmd(dir.path())
        .args(["remote", "rm", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Detached github remote"));

    #[cfg(target_os = "linux")]
    assert!(!dir.path().join("config/pebble/github-tokens").exists());
}

#[test]
fn setup_defaults_come_from_git_config() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    fs::write(
        dir.path().join(".git/config"),
        "[remote \"origin\"]\n\turl = git@github.com:hobbit/shire.git\n",
    )
    .unwrap();

    // Blank answers accept the harvested user and repo.
    pb_cmd(dir.path())
        .args(["remote", "add", "github"])
        .write_stdin("\nsecret-token\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[hobbit]"))
        .stdout(predicate::str::contains("[shire]"))
        .stdout(predicate::str::contains("Attached github remote"));
}

#[test]
fn setup_cancels_on_blank_input() {
    let dir = TempDir::new().unwrap();

    // No .git/config means no default user, so a blank answer gives up.
    pb_cmd(dir.path())
        .args(["remote", "add", "github"])
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled remote setup"));

    pb_cmd(dir.path())
        .args(["remote", "rm", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote 'github' is not attached"));
}

#[test]
fn detach_when_not_attached() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["remote", "rm", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote 'github' is not attached"));
}

#[test]
fn unknown_backends_are_rejected() {
    let dir = TempDir::new().unwrap();

    pb_cmd(dir.path())
        .args(["remote", "add", "gitlab"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Unknown remote 'gitlab'; available: github",
        ));

    pb_cmd(dir.path())
        .args(["remote", "rm", "gitlab"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Unknown remote 'gitlab'; available: github",
        ));
}

#[cfg(target_os = "linux")]
fn contains_slice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
