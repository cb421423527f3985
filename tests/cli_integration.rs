//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test, isolated from any local config and API key.
fn tryon(dir: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tryon").unwrap();
    cmd.current_dir(dir.path()).env_remove("GEMINI_API_KEY").env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Virtual try-on"));
}

#[test]
fn test_short_help_flag() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir).arg("-h").assert().success().stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_subcommand_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir).assert().failure().stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir).arg("teleport").assert().failure();
}

// ============================================================================
// Run Command Tests
// ============================================================================

#[test]
fn test_run_help() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--subject"))
        .stdout(predicate::str::contains("--garment"))
        .stdout(predicate::str::contains("--premium"));
}

#[test]
fn test_run_requires_both_images() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir).args(["run", "--subject", "me.png"]).assert().failure();
}

#[test]
fn test_run_missing_subject_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("shirt.png").write_binary(b"\x89PNG\r\n\x1a\nshirt").unwrap();

    tryon(&dir)
        .args(["run", "--subject", "missing.png", "--garment", "shirt.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load subject image"));
}

#[test]
fn test_run_empty_garment_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("me.png").write_binary(b"\x89PNG\r\n\x1a\nme").unwrap();
    dir.child("shirt.png").touch().unwrap();

    tryon(&dir)
        .args(["run", "--subject", "me.png", "--garment", "shirt.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load garment image"));
}

#[test]
fn test_run_without_api_key() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("me.png").write_binary(b"\x89PNG\r\n\x1a\nme").unwrap();
    dir.child("shirt.png").write_binary(b"\x89PNG\r\n\x1a\nshirt").unwrap();

    tryon(&dir)
        .args(["run", "--subject", "me.png", "--garment", "shirt.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));

    dir.child("tryon-result.png").assert(predicate::path::missing());
}

#[test]
fn test_run_unknown_provider() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child(".tryon.toml").write_str("[generation]\nprovider = \"dall-e\"\n").unwrap();
    dir.child("me.png").write_binary(b"\x89PNG\r\n\x1a\nme").unwrap();
    dir.child("shirt.png").write_binary(b"\x89PNG\r\n\x1a\nshirt").unwrap();

    tryon(&dir)
        .args(["run", "--subject", "me.png", "--garment", "shirt.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dall-e"));
}

// ============================================================================
// Status & Config Tests
// ============================================================================

#[test]
fn test_status_defaults() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Free attempts per session: 3"))
        .stdout(predicate::str::contains("API key (GEMINI_API_KEY): not set"));
}

#[test]
fn test_status_with_api_key() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .env("GEMINI_API_KEY", "test-key")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("API key (GEMINI_API_KEY): set"));
}

#[test]
fn test_status_json() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stdout(predicate::str::contains("\"api_key_set\": false"))
        .stdout(predicate::str::contains("\"free_limit\": 3"));
}

#[test]
fn test_status_reads_project_config() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child(".tryon.toml").write_str("[entitlement]\nfree_limit = 5\n").unwrap();

    tryon(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Free attempts per session: 5"));
}

#[test]
fn test_config_shows_sections() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[entitlement]"))
        .stdout(predicate::str::contains("[generation]"))
        .stdout(predicate::str::contains("[messages]"));
}

#[test]
fn test_config_path() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tryon"));
}

#[test]
fn test_invalid_project_config() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child(".tryon.toml").write_str("[entitlement\nfree_limit = ").unwrap();

    tryon(&dir).arg("status").assert().failure();
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tryon"));
}

#[test]
fn test_completions_invalid_shell() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir).args(["completions", "tcsh"]).assert().failure();
}

// ============================================================================
// Shell Command Tests
// ============================================================================

#[test]
fn test_shell_help_and_quit() {
    let dir = assert_fs::TempDir::new().unwrap();
    tryon(&dir)
        .env("GEMINI_API_KEY", "test-key")
        .arg("shell")
        .write_stdin("help\nbogus\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("subject <file>"))
        .stdout(predicate::str::contains("Unknown command: bogus"));
}

#[test]
fn test_shell_reports_incomplete_input() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("me.png").write_binary(b"\x89PNG\r\n\x1a\nme").unwrap();

    tryon(&dir)
        .env("GEMINI_API_KEY", "test-key")
        .arg("shell")
        .write_stdin("subject me.png\nnext\ngenerate\nsave\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[step 2/4]"))
        .stdout(predicate::str::contains("Please provide both images."))
        .stdout(predicate::str::contains("No result to save yet"));
}
