//! CLI integration tests

use std::process::Command;

fn fad(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-p", "fad-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = fad(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Fake Account Detector"),
        "Should show app name"
    );
    assert!(stdout.contains("health"), "Should show health command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("info"), "Should show info command");
    assert!(stdout.contains("smoke"), "Should show smoke command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = fad(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("fad"), "Should show binary name");
}

/// Test predict subcommand help lists every feature flag
#[test]
fn test_predict_help() {
    let output = fad(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in [
        "--username-length",
        "--num-posts",
        "--num-followers",
        "--num-following",
        "--account-age-days",
        "--has-profile-picture",
        "--has-bio",
        "--engagement-ratio",
        "--is-verified",
        "--file",
    ] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

/// Test global options
#[test]
fn test_global_options() {
    let output = fad(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("--verbose"), "Should show verbose option");
}

/// Test invalid command handling
#[test]
fn test_invalid_command() {
    let output = fad(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}

/// Boolean features only accept 0 or 1
#[test]
fn test_boolean_flag_range() {
    let output = fad(&["predict", "--has-bio", "2"]);
    assert!(!output.status.success(), "Out-of-range flag should fail");
}

/// --file cannot be combined with feature flags
#[test]
fn test_file_conflicts_with_flags() {
    let output = fad(&["predict", "--file", "account.json", "--num-posts", "3"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Conflicting options should fail");
    assert!(stderr.contains("cannot be used with"));
}
