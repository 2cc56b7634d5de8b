// tld-whois/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use tempfile::TempDir;

/// Start a WHOIS server on a background thread and return its address.
///
/// `NOPE` gets a response without a `whois:` line; everything else
/// resolves to `whois.nic.<lowercase tld>`.
fn start_mock_whois() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind mock server");
    let addr = listener.local_addr().unwrap().to_string();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else {
                continue;
            };
            thread::spawn(move || {
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                if reader.read_line(&mut line).is_err() {
                    return;
                }
                let tld = line.trim_end();
                let response = if tld == "NOPE" {
                    "% This query returned 0 objects.\r\n".to_string()
                } else {
                    format!(
                        "domain:       {}\r\n\r\nwhois:        whois.nic.{}\r\n",
                        tld,
                        tld.to_lowercase()
                    )
                };
                let mut stream = reader.into_inner();
                let _ = stream.write_all(response.as_bytes());
            });
        }
    });

    addr
}

/// A workspace with a feed file, isolated from any real config or TW_* vars.
fn workspace(feed: &str) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("tlds.txt"), feed).expect("Failed to write feed");
    dir
}

fn tld_whois(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tld-whois").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("RUST_LOG");
    for var in [
        "TW_ENDPOINT",
        "TW_FEED_URL",
        "TW_FEED_FILE",
        "TW_OUTPUT",
        "TW_CONCURRENCY",
        "TW_CONNECT_TIMEOUT",
        "TW_READ_TIMEOUT",
        "TW_INACTIVITY_WINDOW",
        "TW_MODE",
        "TW_ORDERED",
        "TW_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_shows_options() {
    let mut cmd = Command::cargo_bin("tld-whois").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--inactivity-window"))
        .stdout(predicate::str::contains("--feed-file"))
        .stdout(predicate::str::contains("--endpoint"));
}

#[test]
fn test_invalid_concurrency_rejected() {
    let mut cmd = Command::cargo_bin("tld-whois").unwrap();
    cmd.args(["--concurrency", "0"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Concurrency must be between 1 and 1000"));
}

#[test]
fn test_invalid_mode_rejected() {
    let mut cmd = Command::cargo_bin("tld-whois").unwrap();
    cmd.args(["--mode", "fanout"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown dispatch mode"));
}

#[test]
fn test_end_to_end_writes_table() {
    let endpoint = start_mock_whois();
    let dir = workspace("# Version 2024010100\nCOM\nNOPE\n\nORG\n");

    tld_whois(dir.path())
        .args(["--feed-file", "tlds.txt", "--endpoint", &endpoint, "--ordered", "-q"])
        .assert()
        .success();

    let table = fs::read_to_string(dir.path().join("README.md")).unwrap();
    assert_eq!(
        table,
        "|TLD|WHOIS SERVER|\n|---|---|\n|COM|whois.nic.com|\n|NOPE||\n|ORG|whois.nic.org|\n"
    );
}

#[test]
fn test_json_summary() {
    let endpoint = start_mock_whois();
    let dir = workspace("COM\nNOPE\nORG\n");

    let output = tld_whois(dir.path())
        .args([
            "--feed-file",
            "tlds.txt",
            "--endpoint",
            &endpoint,
            "--output",
            "servers.md",
            "--skip-failures",
            "--json",
            "-c",
            "2",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total"], 3);
    assert_eq!(report["succeeded"], 2);
    assert_eq!(report["not_found"], 1);
    assert_eq!(report["written"], 2);
    assert_eq!(report["stop_reason"], "completed");
    assert_eq!(report["concurrency"], 2);

    let table = fs::read_to_string(dir.path().join("servers.md")).unwrap();
    assert!(table.contains("|COM|whois.nic.com|\n"));
    assert!(!table.contains("NOPE"));
}

#[test]
fn test_config_file_and_env_precedence() {
    let endpoint = start_mock_whois();
    let dir = workspace("NET\n");
    fs::write(
        dir.path().join("tld-whois.toml"),
        "[output]\npath = \"from-file.md\"\n\n[engine]\nconcurrency = 5\nmode = \"pool\"\n",
    )
    .unwrap();

    tld_whois(dir.path())
        .env("TW_ENDPOINT", &endpoint)
        .env("TW_FEED_FILE", "tlds.txt")
        .arg("-q")
        .assert()
        .success();

    let table = fs::read_to_string(dir.path().join("from-file.md")).unwrap();
    assert!(table.ends_with("|NET|whois.nic.net|\n"));
    assert!(!dir.path().join("README.md").exists());
}

#[test]
fn test_missing_feed_file_fails() {
    let dir = workspace("");

    tld_whois(dir.path())
        .args(["--feed-file", "missing.txt", "-q"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Feed error"));

    assert!(!dir.path().join("README.md").exists());
}

#[test]
fn test_invalid_explicit_config_fails() {
    let dir = workspace("COM\n");
    fs::write(dir.path().join("bad.toml"), "[engine]\nconcurrency = 0\n").unwrap();

    tld_whois(dir.path())
        .args(["--config", "bad.toml", "--feed-file", "tlds.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_zero_timeouts_never_reach_the_scan() {
    let endpoint = start_mock_whois();
    let dir = workspace("COM\n");

    tld_whois(dir.path())
        .env("TW_READ_TIMEOUT", "0")
        .env("TW_CONNECT_TIMEOUT", "0s")
        .args(["--feed-file", "tlds.txt", "--endpoint", &endpoint, "-q"])
        .assert()
        .success()
        .stderr(predicate::str::contains("must be greater than zero"));

    let table = fs::read_to_string(dir.path().join("README.md")).unwrap();
    assert!(table.ends_with("|COM|whois.nic.com|\n"));

    fs::write(dir.path().join("zero.toml"), "[query]\nconnect_timeout = \"0s\"\n").unwrap();
    tld_whois(dir.path())
        .args(["--config", "zero.toml", "--feed-file", "tlds.txt", "-q"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("greater than zero"));
}
