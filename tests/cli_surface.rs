//! CLI surface tests for the `foundry` binary
//!
//! These exercise the argument surface and the read-only subcommands; no
//! provider credentials or network access are required.

use assert_cmd::Command;
use predicates::prelude::*;

fn foundry() -> Command {
    Command::cargo_bin("foundry").expect("foundry binary builds")
}

#[test]
fn test_help_lists_all_verbs() {
    foundry()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("build")
                .and(predicate::str::contains("fix"))
                .and(predicate::str::contains("enhance"))
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("models"))
                .and(predicate::str::contains("pricing"))
                .and(predicate::str::contains("estimate")),
        );
}

#[test]
fn test_models_lists_providers_without_credentials() {
    foundry()
        .arg("models")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Anthropic")
                .and(predicate::str::contains("OpenAI"))
                .and(predicate::str::contains("claude-sonnet-4-5")),
        );
}

#[test]
fn test_pricing_prints_table() {
    foundry()
        .arg("pricing")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("provider")
                .and(predicate::str::contains("anthropic"))
                .and(predicate::str::contains("gpt-4o")),
        );
}

#[test]
fn test_config_shows_phase_assignments() {
    foundry()
        .arg("config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("scout")
                .and(predicate::str::contains("architect"))
                .and(predicate::str::contains("builder")),
        );
}

#[test]
fn test_estimate_reports_total() {
    foundry()
        .args(["estimate", "--input-tokens", "1000", "--output-tokens", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("estimated total"));
}

#[test]
fn test_status_of_unknown_project_reports_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    foundry()
        .args(["status", "ghost-project"])
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions recorded"));
}

#[test]
fn test_external_verbs_print_pointer() {
    for verb in ["patterns", "analyze", "serve"] {
        foundry()
            .arg(verb)
            .assert()
            .success()
            .stdout(predicate::str::contains("external"));
    }
}

#[test]
fn test_unknown_subcommand_fails() {
    foundry().arg("frobnicate").assert().failure();
}
