//! End-to-end tests of the galaxy-sync binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn galaxy_sync(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("galaxy-sync").unwrap();
    cmd.arg("--data-dir").arg(data_dir).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn conversation_id_is_symmetric() {
    let dir = tempdir().unwrap();
    galaxy_sync(dir.path())
        .args(["conversation-id", "bob", "alice"])
        .assert()
        .success()
        .stdout("alice_bob\n");
}

#[test]
fn conversation_id_rejects_same_user() {
    let dir = tempdir().unwrap();
    galaxy_sync(dir.path())
        .args(["conversation-id", "alice", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("two distinct participants"));
}

#[test]
fn commands_require_init() {
    let dir = tempdir().unwrap();
    galaxy_sync(dir.path())
        .arg("conversations")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not initialized"));
}

#[test]
fn init_then_empty_cache() {
    let dir = tempdir().unwrap();
    galaxy_sync(dir.path())
        .args(["init", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("User:     alice"));
    assert!(dir.path().join("galaxy-sync.toml").exists());

    galaxy_sync(dir.path())
        .arg("conversations")
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached conversations."));
}

#[test]
fn demo_runs_in_memory() {
    let dir = tempdir().unwrap();
    galaxy_sync(dir.path())
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Paged to the end: 45 messages"))
        .stdout(predicate::str::contains("alice_carol"))
        .stdout(predicate::str::contains("gone from cache"));
}

#[test]
fn persisted_demo_is_visible_and_sign_out_clears_it() {
    let dir = tempdir().unwrap();
    galaxy_sync(dir.path())
        .args(["init", "--user", "alice"])
        .assert()
        .success();
    galaxy_sync(dir.path())
        .args(["demo", "--persist"])
        .assert()
        .success();

    galaxy_sync(dir.path())
        .arg("conversations")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice_bob"))
        .stdout(predicate::str::contains("with Bob"))
        .stdout(predicate::str::contains("alice_carol"));
    galaxy_sync(dir.path())
        .args(["messages", "alice_bob", "--limit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("this one will fail"))
        .stdout(predicate::str::contains("<failed>"));

    galaxy_sync(dir.path()).arg("sign-out").assert().success();
    galaxy_sync(dir.path())
        .arg("conversations")
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached conversations."));
}
