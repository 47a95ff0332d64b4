use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_displays_usage() {
    Command::cargo_bin("repo2md")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn export_help_lists_filters() {
    Command::cargo_bin("repo2md")
        .expect("binary exists")
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--exclude-ext"))
        .stdout(predicate::str::contains("--mode"));
}

#[test]
fn completions_are_generated_offline() {
    let temp = tempfile::tempdir().unwrap();
    Command::cargo_bin("repo2md")
        .expect("binary exists")
        .current_dir(temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("repo2md"));
}

#[test]
fn unknown_mode_is_rejected() {
    Command::cargo_bin("repo2md")
        .expect("binary exists")
        .args(["export", "https://example.invalid/r.git", "--mode", "pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
