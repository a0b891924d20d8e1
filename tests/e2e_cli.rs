//! CLI end-to-end tests
//!
//! Tests for the syncforge command-line interface.

mod common;

use assert_cmd::prelude::*;
use common::Harness;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the syncforge binary
#[allow(deprecated)]
fn syncforge_cmd() -> Command {
    Command::cargo_bin("syncforge").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = syncforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_hides_worker() {
    let mut cmd = syncforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("syncforge"))
        .stdout(predicate::str::contains("check-tools"))
        .stdout(predicate::str::contains("worker").not());
}

#[test]
fn test_cli_version_command() {
    let mut cmd = syncforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("syncforge {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = syncforge_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffmpeg")
            .and(predicate::str::contains("ffprobe"))
            .and(predicate::str::contains("python")),
    );
}

#[test]
fn test_cli_run_help() {
    let mut cmd = syncforge_cmd();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source-a"))
        .stdout(predicate::str::contains("--request"));
}

#[test]
fn test_cli_run_requires_sources() {
    let mut cmd = syncforge_cmd();
    cmd.args(["run", "--output", "/tmp/out.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source-a"));
}

#[test]
fn test_cli_validate_reports_warnings() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("syncforge.toml");
    fs::write(
        &config,
        "[identify]\nreference_marker = \"\"\n\n[timeouts]\nmerge = 0\n",
    )
    .unwrap();

    let mut cmd = syncforge_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("reference_marker is empty"))
        .stdout(predicate::str::contains("timeouts.merge is 0"));
}

#[test]
fn test_cli_validate_rejects_bad_toml() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[scratch\ndir = 3").unwrap();

    let mut cmd = syncforge_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn test_cli_run_through_scripted_worker() {
    let harness = Harness::new();
    let config = harness.write_config();
    let output = harness.path().join("final.mp4");

    let mut cmd = syncforge_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--source-a")
        .arg(harness.path().join("IMG_0001.MOV"))
        .arg("--source-b")
        .arg(harness.path().join("ScreenRecording_0001.MP4"))
        .args(["--artist", "Artist", "--title", "Song", "--json"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"))
        .stdout(predicate::str::contains("final.mp4"));

    assert!(output.exists());
}

#[test]
fn test_cli_run_reports_worker_failure() {
    let harness = Harness::new();
    let config = harness.write_config();

    let mut cmd = syncforge_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--source-a")
        .arg(harness.path().join("IMG_0001.MOV"))
        .arg("--source-b")
        .arg(harness.path().join("ScreenRecording_0001.MP4"))
        .args(["--artist", "Artist", "--title", "Song"])
        .arg("--output")
        .arg(harness.path().join("FAILME.mp4"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("[1/10] Identifying sources"))
        .stderr(predicate::str::contains("boom"));
}

#[test]
fn test_cli_batch_json_outcome() {
    let harness = Harness::new();
    let config = harness.write_config();
    let batch = harness.path().join("batch.json");
    let items: Vec<_> = ["a.mp4", "FAILME.mp4", "c.mp4"]
        .iter()
        .map(|name| harness.item(name))
        .collect();
    fs::write(
        &batch,
        serde_json::to_string(&serde_json::json!({ "items": items })).unwrap(),
    )
    .unwrap();

    let mut cmd = syncforge_cmd();
    let assert = cmd
        .arg("--config")
        .arg(&config)
        .arg("batch")
        .arg(&batch)
        .arg("--json")
        .assert()
        .success();

    let outcome: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(outcome["success"], true);
    let flags: Vec<bool> = outcome["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["success"].as_bool().unwrap())
        .collect();
    assert_eq!(flags, vec![true, false, true]);
    assert_eq!(
        outcome["results"][1]["stack"],
        "ExternalToolError: alignment extract failed"
    );
    assert!(outcome["results"][0].get("stack").is_none());
}

#[test]
fn test_cli_worker_speaks_the_protocol() {
    let dir = tempdir().unwrap();
    let start = serde_json::json!({
        "type": "start",
        "payload": {
            "inputs": {
                "sourceA": dir.path().join("IMG_1.MOV"),
                "sourceB": dir.path().join("IMG_2.MOV"),
                "artist": "A",
                "title": "T"
            },
            "outputOptions": { "outputPath": dir.path().join("out.mp4") }
        }
    });

    let mut cmd = assert_cmd::Command::from_std(syncforge_cmd());
    let assert = cmd
        .args(["worker", "--run-id", "6f1c2a4e-8d3b-4f7a-9e21-0c5d8b7a6f43"])
        .arg("--scratch-dir")
        .arg(dir.path().join("scratch"))
        .write_stdin(format!("{start}\n"))
        .assert()
        .code(1);

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let frames: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(frames.first().unwrap()["type"], "ready");
    assert_eq!(frames.last().unwrap()["type"], "error");
    assert!(frames.last().unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("Identification error"));
    assert!(frames
        .iter()
        .any(|f| f["type"] == "progress" && f["stage"] == -1));
}
