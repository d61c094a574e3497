// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Command-line behaviour

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn assetflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("assetflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("ASSETFLOW_FILE")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn write(dir: &Path, path: &str, text: &str) {
    let full = dir.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, text).unwrap();
}

const BUILD: &str = r#"
tasks:
  scripts:
    src: js/*.js
    stages:
      - type: concat
        file: app.js
      - type: banner
        template: "/* {{ date }} */\n"
      - type: dest
        dir: dist
  copy:
    src: static/*.txt
    stages:
      - type: dest
        dir: dist
  default:
    sequence: [scripts, copy]
"#;

#[test]
fn test_init_writes_build_file() {
    let dir = tempfile::tempdir().unwrap();

    assetflow(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created assetflow.yaml"));

    let written = std::fs::read_to_string(dir.path().join("assetflow.yaml")).unwrap();
    assert!(written.contains("plugin-styles"));

    assetflow(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assetflow(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn test_list_and_graph() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "assetflow.yaml", BUILD);

    assetflow(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("scripts"))
        .stdout(predicate::str::contains("concat → banner → dest"))
        .stdout(predicate::str::contains("runs: scripts, copy"));

    assetflow(dir.path())
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"))
        .stdout(predicate::str::contains("default --> scripts"));

    assetflow(dir.path())
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"default\" -> \"copy\" [label=\"2\"];"));
}

#[test]
fn test_validate() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "assetflow.yaml", BUILD);

    assetflow(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build file is valid"));

    write(
        dir.path(),
        "broken.yaml",
        "tasks:\n  default:\n    sequence: [ghost]\n",
    );
    assetflow(dir.path())
        .args(["validate", "--file", "broken.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown task 'ghost'"));
}

#[test]
fn test_run_default_task() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "assetflow.yaml", BUILD);
    write(dir.path(), "js/a.js", "var a;");
    write(dir.path(), "js/b.js", "var b;");
    write(dir.path(), "static/robots.txt", "User-agent: *");

    assetflow(dir.path())
        .args(["run", "--build-date", "2024-01-02T03:04:05+01:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task 'default' finished"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("dist/app.js")).unwrap(),
        "/* 2024-01-02 03:04:05 +0100 */\nvar a;\nvar b;"
    );
    assert!(dir.path().join("dist/robots.txt").exists());
}

#[test]
fn test_run_with_directory_and_env_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "site/build.yaml", BUILD);
    write(dir.path(), "site/static/a.txt", "a");

    assetflow(dir.path())
        .env("ASSETFLOW_FILE", "build.yaml")
        .args(["-C", "site", "run", "copy"])
        .assert()
        .success();

    assert!(dir.path().join("site/dist/a.txt").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "assetflow.yaml", BUILD);
    write(dir.path(), "js/a.js", "var a;");

    assetflow(dir.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scripts js/*.js concat → banner → dest"))
        .stdout(predicate::str::contains("copy static/*.txt dest"));

    assert!(!dir.path().join("dist").exists());
}

#[test]
fn test_run_unknown_task() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "assetflow.yaml", BUILD);

    assetflow(dir.path())
        .args(["run", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task 'nope' is not defined"));
}

#[test]
fn test_run_failure_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "assetflow.yaml",
        r#"
tasks:
  default:
    src: "*.scss"
    stages:
      - type: compile
        command: sh
        args: ["-c", "cat >/dev/null; echo 'Error: broken' >&2; echo 'line 2' >&2; exit 1"]
        extension: css
        label: Sass
"#,
    );
    write(dir.path(), "main.scss", "a {\n  @@\n}");

    assetflow(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error compiling Sass in task 'default'."))
        .stderr(predicate::str::contains("Line: 2"))
        .stderr(predicate::str::contains("Task 'default' failed"));
}

#[test]
fn test_missing_build_file() {
    let dir = tempfile::tempdir().unwrap();

    assetflow(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Build file not found"));
}

#[test]
fn test_serve_fails_fast_on_taken_port() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    write(
        dir.path(),
        "assetflow.yaml",
        &format!("{}\nserver:\n  host: 127.0.0.1\n  port: {}\n", BUILD, port),
    );
    write(dir.path(), "js/a.js", "var a;");

    assetflow(dir.path())
        .args(["watch", "--serve"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not bind"));

    drop(taken);
}
