//! End-to-end coverage for `gitrun completion`: shell completion script
//! generation via `clap_complete`.

use assert_cmd::Command;
use predicates::str::contains;

fn gitrun() -> Command {
    Command::cargo_bin("gitrun").unwrap()
}

#[test]
fn completion_bash_mentions_the_binary_name() {
    gitrun()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("gitrun"));
}

#[test]
fn completion_zsh_succeeds() {
    gitrun().args(["completion", "zsh"]).assert().success();
}

#[test]
fn completion_fish_succeeds() {
    gitrun().args(["completion", "fish"]).assert().success();
}

#[test]
fn completion_rejects_unknown_shell() {
    gitrun().args(["completion", "not-a-shell"]).assert().failure();
}
