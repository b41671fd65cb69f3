// CLI integration tests for yakusoku

use std::process::Command;

fn yakusoku() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_yakusoku"));
    // Keep the developer's own config out of the results
    command.env("XDG_CONFIG_HOME", "/nonexistent-yakusoku-config");
    command
}

/// Test that --help lists the subcommands
#[test]
fn test_help_flag_shows_subcommands() {
    let output = yakusoku()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Help should exit with success");
    assert!(stdout.contains("simulate"), "Got: {}", stdout);
    assert!(stdout.contains("config"), "Got: {}", stdout);
}

/// Test that a quick computation is rendered with status 200
#[test]
fn test_simulate_renders_value() {
    let output = yakusoku()
        .args(["simulate", "--delay-ms", "1", "--nest", "3"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("response should be JSON");
    assert_eq!(response["status"], 200);
    assert_eq!(response["body"]["delay_ms"], 1);
}

/// Test that a computation outliving its deadline yields the 504 response
#[test]
fn test_simulate_timeout() {
    let output = yakusoku()
        .args(["simulate", "--delay-ms", "2000", "--deadline-ms", "20"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], 504);
    assert_eq!(response["body"], "Gateway timeout");
}

/// Test that a halt status is written as-is
#[test]
fn test_simulate_halt() {
    let output = yakusoku()
        .args(["simulate", "--delay-ms", "1", "--halt-status", "418"])
        .output()
        .expect("Failed to execute command");

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], 418);
}

/// Test that project settings are picked up from --config
#[test]
fn test_config_show_reads_project_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("yakusoku.toml"),
        "development_mode = true\nasync_timeout = \"unbounded\"\n",
    )
    .unwrap();

    let output = yakusoku()
        .args(["--config", dir.path().to_str().unwrap(), "config", "show"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("development_mode = true"), "Got: {}", stdout);
    assert!(stdout.contains("async_timeout = \"unbounded\""), "Got: {}", stdout);
}

/// Test that development mode appends the failure message
#[test]
fn test_simulate_failure_in_development_mode() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("yakusoku.toml"), "development_mode = true\n").unwrap();

    let output = yakusoku()
        .args(["--config", dir.path().to_str().unwrap()])
        .args(["simulate", "--delay-ms", "1", "--fail", "disk full"])
        .output()
        .expect("Failed to execute command");

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], 500);
    assert_eq!(response["body"], "500 Internal Server Error: disk full");
}
