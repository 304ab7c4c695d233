//! The `runguard` binary end to end

use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::common::{runguard, runguard_logged};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[cfg(unix)]
#[test]
fn exec_passes_through_child_exit_code() {
    let dir = TempDir::new().unwrap();
    let output = runguard(dir.path(), &["exec", "--", "sh", "-c", "exit 3"]);
    assert_eq!(output.status.code(), Some(3));
}

#[cfg(unix)]
#[test]
fn exec_relays_child_output() {
    let dir = TempDir::new().unwrap();
    let output = runguard(dir.path(), &["exec", "--", "echo", "-n", "hello"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello");
}

#[cfg(unix)]
#[test]
fn exec_times_out_with_124() {
    let dir = TempDir::new().unwrap();
    let started = Instant::now();

    let output = runguard(dir.path(), &["exec", "--timeout-ms", "100", "--", "sleep", "10"]);

    assert_eq!(output.status.code(), Some(124));
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[cfg(unix)]
#[test]
fn config_file_timeout_applies_to_exec() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[guard]\ntimeout_ms = 100\n").unwrap();

    let output = runguard(dir.path(), &["exec", "--", "sleep", "10"]);
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn exec_of_missing_program_is_127() {
    let dir = TempDir::new().unwrap();
    let output = runguard(dir.path(), &["exec", "--", "runguard-no-such-program-xyz"]);
    assert_eq!(output.status.code(), Some(127));
}

#[test]
fn zero_timeout_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = runguard(dir.path(), &["exec", "--timeout-ms", "0", "--", "true"]);
    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(124));
}

#[test]
fn settings_default_to_ten_seconds() {
    let dir = TempDir::new().unwrap();
    let output = runguard(dir.path(), &["settings"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("timeout_ms 10000"), "{text}");
    assert!(text.contains("source     default"), "{text}");
}

#[test]
fn settings_reflect_config_file_then_flag() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[guard]\ntimeout_ms = 2500\n").unwrap();

    let from_file = stdout(&runguard(dir.path(), &["settings"]));
    assert!(from_file.contains("timeout_ms 2500"), "{from_file}");
    assert!(from_file.contains("source     config file"), "{from_file}");

    let from_flag = stdout(&runguard(dir.path(), &["settings", "--timeout-ms", "40"]));
    assert!(from_flag.contains("timeout_ms 40"), "{from_flag}");
    assert!(from_flag.contains("source     command line"), "{from_flag}");
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    let output = runguard(
        dir.path(),
        &["--config", missing.to_str().unwrap(), "settings"],
    );
    assert!(!output.status.success());
}

#[test]
fn malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[guard\ntimeout_ms = ").unwrap();

    let output = runguard(dir.path(), &["settings"]);
    assert!(!output.status.success());
}

#[test]
fn config_load_failure_is_logged() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[guard\ntimeout_ms = ").unwrap();

    let output = runguard_logged(dir.path(), &["settings"], "error");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR"), "{stderr}");
    assert!(
        stderr.contains("failed to load config: failed to parse config at"),
        "{stderr}"
    );
}
