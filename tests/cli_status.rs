//! End-to-end coverage for `gitrun status`: inspecting real working trees.

use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn gitrun() -> Command {
    Command::cargo_bin("gitrun").unwrap()
}

fn run_git(dir: &std::path::Path, args: &[&str]) {
    let status = StdCommand::new("git").args(args).current_dir(dir).status().unwrap();
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// Builds a working tree at `dir` with an `origin` remote and proper
/// upstream tracking, by cloning from a throwaway bare repo — a plain
/// `git init` has no remote or upstream, which would classify every status
/// as `no-remote` rather than `clean`/`dirty`.
fn init_clean_repo(dir: &std::path::Path) {
    let parent = dir.parent().unwrap();
    let seed = parent.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    run_git(&seed, &["init", "--quiet"]);
    run_git(&seed, &["config", "user.email", "test@example.com"]);
    run_git(&seed, &["config", "user.name", "Test"]);
    std::fs::write(seed.join("README.md"), "hello\n").unwrap();
    run_git(&seed, &["add", "."]);
    run_git(&seed, &["commit", "--quiet", "-m", "initial"]);

    let bare = parent.join("origin.git");
    run_git(
        parent,
        &["clone", "--quiet", "--bare", seed.to_str().unwrap(), bare.to_str().unwrap()],
    );
    run_git(
        parent,
        &["clone", "--quiet", bare.to_str().unwrap(), dir.to_str().unwrap()],
    );
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test"]);
}

#[test]
fn status_reports_clean_for_a_freshly_committed_repo() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    init_clean_repo(&repo);

    gitrun()
        .arg("status")
        .arg(&repo)
        .arg("--skip-fetch")
        .assert()
        .success()
        .stdout(contains("clean"));
}

#[test]
fn status_reports_dirty_for_a_modified_working_tree() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    init_clean_repo(&repo);
    std::fs::write(repo.join("README.md"), "changed\n").unwrap();

    gitrun()
        .arg("status")
        .arg(&repo)
        .arg("--skip-fetch")
        .assert()
        .success()
        .stdout(contains("dirty"));
}

#[test]
fn status_json_includes_branch_field() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    init_clean_repo(&repo);

    gitrun()
        .arg("status")
        .arg(&repo)
        .arg("--skip-fetch")
        .arg("--json")
        .assert()
        .success()
        .stdout(contains("\"branch\""));
}

#[test]
fn status_with_roots_scans_for_repos() {
    let dir = TempDir::new().unwrap();
    init_clean_repo(&dir.path().join("one"));

    gitrun()
        .arg("status")
        .arg("--root")
        .arg(dir.path())
        .arg("--skip-fetch")
        .assert()
        .success()
        .stdout(contains("one"));
}
