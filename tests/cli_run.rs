//! End-to-end coverage for `gitrun run`: orchestrating the plan built from a
//! manifest. These tests stay off the network by relying on `--dry-run`,
//! which never invokes `git clone`/`fetch` against a remote that doesn't
//! exist, and by using `assume_present` repos pointed at real local working
//! trees for the mutating cases.

use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn gitrun() -> Command {
    Command::cargo_bin("gitrun").unwrap()
}

fn write_manifest(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("gitrun.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn dry_run_previews_a_clone_without_creating_the_directory() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        dir.path(),
        r#"
kind: repositories
repositories:
  - url: https://example.com/org/widgets.git
"#,
    );

    gitrun()
        .arg("run")
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(contains("succeeded"));

    assert!(!dir.path().join("widgets").exists());
}

#[test]
fn dry_run_on_a_clean_existing_repo_succeeds() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("existing");
    std::fs::create_dir_all(&repo).unwrap();
    let run_git = |args: &[&str]| {
        let status = StdCommand::new("git").args(args).current_dir(&repo).status().unwrap();
        assert!(status.success());
    };
    run_git(&["init", "--quiet"]);
    run_git(&["config", "user.email", "test@example.com"]);
    run_git(&["config", "user.name", "Test"]);
    std::fs::write(repo.join("a.txt"), "1\n").unwrap();
    run_git(&["add", "."]);
    run_git(&["commit", "--quiet", "-m", "initial"]);

    let manifest = write_manifest(
        dir.path(),
        r#"
kind: repositories
repositories:
  - name: existing
    assumePresent: true
    strategy: fetch
"#,
    );

    gitrun()
        .arg("run")
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .assert()
        .success();
}

#[test]
fn run_with_empty_manifest_succeeds_with_no_actions() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(dir.path(), "kind: repositories\nrepositories: []\n");

    gitrun()
        .arg("run")
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .assert()
        .success();
}

#[test]
fn run_persists_state_file_across_invocations() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        dir.path(),
        r#"
kind: repositories
repositories:
  - url: https://example.com/org/widgets.git
"#,
    );
    let state = dir.path().join("state.json");

    gitrun()
        .arg("run")
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .arg("--state")
        .arg(&state)
        .assert()
        .success();

    assert!(state.exists(), "expected a state file to be written");
}

#[test]
fn run_with_missing_manifest_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    gitrun()
        .arg("run")
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .code(2);
}
