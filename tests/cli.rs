//! Integration tests for the opensandbox-runtime CLI.
//!
//! These tests run the actual executable and check output, exit codes, and
//! file system effects.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// -----------------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------------

#[allow(deprecated)]
fn runtime() -> Command {
    let mut cmd =
        Command::cargo_bin("opensandbox-runtime").expect("failed to find opensandbox-runtime binary");
    cmd.env_remove("OPENSANDBOX_CONFIG");
    cmd
}

/// Creates a Command running in a specific directory.
fn runtime_in(dir: &TempDir) -> Command {
    let mut cmd = runtime();
    cmd.current_dir(dir.path());
    cmd
}

/// A project directory with a minimal agent-sandbox config and template.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("opensandbox.toml"),
        r#"
[runtime]
type = "agent-sandbox"
execd_image = "ghcr.io/opensandbox/execd:test"

[kubernetes]
namespace = "sandboxes"

[agent_sandbox]
template_file = "template.yaml"
shutdown_policy = "Retain"
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("template.yaml"),
        "metadata:\n  annotations:\n    owner: ops\nspec:\n  podTemplate:\n    spec:\n      nodeSelector:\n        pool: sandbox\n",
    )
    .unwrap();
    dir
}

// -----------------------------------------------------------------------------
// Help and version tests
// -----------------------------------------------------------------------------

#[test]
fn test_help_shows_all_commands() {
    runtime()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("opensandbox-runtime"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("template"))
        .stdout(predicate::str::contains("render"));
}

#[test]
fn test_version_shows_version() {
    runtime()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("opensandbox-runtime"));
}

#[test]
fn test_render_help_shows_options() {
    runtime()
        .args(["render", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--image"))
        .stdout(predicate::str::contains("--label"))
        .stdout(predicate::str::contains("--timeout-secs"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_unknown_command_fails() {
    runtime().arg("bogus").assert().failure();
}

// -----------------------------------------------------------------------------
// Init
// -----------------------------------------------------------------------------

#[test]
fn test_init_creates_starter_files() {
    let dir = TempDir::new().unwrap();

    runtime_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Starter files written"));

    assert!(dir.path().join("opensandbox.toml").exists());
    assert!(dir.path().join("deploy/sandbox-template.yaml").exists());
}

#[test]
fn test_init_skips_existing_without_force() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("opensandbox.toml"), "# mine\n").unwrap();

    runtime_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let content = fs::read_to_string(dir.path().join("opensandbox.toml")).unwrap();
    assert_eq!(content, "# mine\n");
}

#[test]
fn test_init_force_overwrites() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("opensandbox.toml"), "# mine\n").unwrap();

    runtime_in(&dir)
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overwritten"));

    let content = fs::read_to_string(dir.path().join("opensandbox.toml")).unwrap();
    assert!(content.contains("agent-sandbox"));
}

// -----------------------------------------------------------------------------
// Check
// -----------------------------------------------------------------------------

#[test]
fn test_check_valid_config() {
    let dir = project();

    runtime_in(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("sandboxes"))
        .stdout(predicate::str::contains("Retain"));
}

#[test]
fn test_check_docker_runtime_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("opensandbox.toml"),
        "[runtime]\ntype = \"docker\"\n",
    )
    .unwrap();

    runtime_in(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_CONFIGURATION / HTTP 500"))
        .stderr(predicate::str::contains("requires runtime.type = 'agent-sandbox'").count(1));
}

#[test]
fn test_check_missing_template_is_initialization_error() {
    let dir = project();
    fs::remove_file(dir.path().join("template.yaml")).unwrap();

    runtime_in(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("K8S_INITIALIZATION_ERROR"));
}

#[test]
fn test_check_missing_config_fails() {
    let dir = TempDir::new().unwrap();

    runtime_in(&dir)
        .args(["--config", "nope.toml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn test_check_resolves_template_next_to_config() {
    let project = project();
    let elsewhere = TempDir::new().unwrap();
    let config = project.path().join("opensandbox.toml");

    runtime_in(&elsewhere)
        .args(["--config", config.to_str().unwrap(), "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));

    runtime_in(&elsewhere)
        .args(["--config", config.to_str().unwrap(), "template"])
        .assert()
        .success()
        .stdout(predicate::str::contains("owner: ops"));
}

#[test]
fn test_init_then_check() {
    let dir = TempDir::new().unwrap();
    runtime_in(&dir).arg("init").assert().success();

    runtime_in(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy/sandbox-template.yaml"));
}

// -----------------------------------------------------------------------------
// Template and render
// -----------------------------------------------------------------------------

#[test]
fn test_template_prints_base() {
    let dir = project();

    runtime_in(&dir)
        .arg("template")
        .assert()
        .success()
        .stdout(predicate::str::contains("owner: ops"))
        .stdout(predicate::str::contains("pool: sandbox"));
}

#[test]
fn test_render_merges_override_over_template() {
    let dir = project();

    runtime_in(&dir)
        .args([
            "render",
            "--image",
            "python:3.11",
            "--id",
            "sb-1",
            "--command",
            "python -m http.server",
            "--label",
            "team=platform",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: Sandbox"))
        .stdout(predicate::str::contains("owner: ops"))
        .stdout(predicate::str::contains("pool: sandbox"))
        .stdout(predicate::str::contains("python:3.11"))
        .stdout(predicate::str::contains("http.server"))
        .stdout(predicate::str::contains("team: platform"))
        .stdout(predicate::str::contains("opensandbox.io/id: sb-1"));
}

#[test]
fn test_render_does_not_modify_template_file() {
    let dir = project();
    let before = fs::read_to_string(dir.path().join("template.yaml")).unwrap();

    runtime_in(&dir)
        .args(["render", "--image", "alpine", "--id", "sb-2"])
        .assert()
        .success();

    let after = fs::read_to_string(dir.path().join("template.yaml")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_render_json_prints_sandbox() {
    let dir = project();

    let output = runtime_in(&dir)
        .args([
            "render",
            "--image",
            "alpine",
            "--id",
            "sb-json",
            "--timeout-secs",
            "600",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let sandbox: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(sandbox["id"], "sb-json");
    assert_eq!(sandbox["image"]["uri"], "alpine");
    assert_eq!(sandbox["status"]["state"], "Running");
    assert!(sandbox["expiresAt"].is_string());
}

#[test]
fn test_render_invalid_id_fails() {
    let dir = project();

    runtime_in(&dir)
        .args(["render", "--image", "alpine", "--id", "Bad_Id"])
        .assert()
        .failure();
}

#[test]
fn test_render_bad_label_fails() {
    let dir = project();

    runtime_in(&dir)
        .args(["render", "--image", "alpine", "--label", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}
