// ABOUTME: Integration tests for the keel CLI surface.
// ABOUTME: Validates --help output and commands that need no running stack.

use assert_cmd::Command;
use predicates::prelude::*;

fn keel_cmd(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("keel"));
    cmd.env("KEEL_CONFIG_DIR", config_dir)
        .env("KEEL_RELEASE_FEED_URL", "file:///nonexistent/keel/releases.json")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_shows_commands() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("self-update"));
}

#[test]
fn version_command_prints_version() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("keel "));
}

#[test]
fn config_path_honors_env_override() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deployments.yml"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().as_ref()));
}

#[test]
fn status_without_install_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("keel install"));
}

#[test]
fn unknown_provider_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .args(["prereqs", "--provider", "heroku"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider 'heroku'"));
}

#[test]
fn invalid_deployment_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .args(["--name", "Prod", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be lowercase"));
}

#[test]
fn restore_of_unknown_backup_needs_an_install() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .args(["restore", "20240101-030000", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("keel install"));
}

#[test]
fn json_mode_prints_prerequisites_as_json() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .args(["--json", "prereqs", "--provider", "railway"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"met\""))
        .stdout(predicate::str::contains("railway CLI"));
}
