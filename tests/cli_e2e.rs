//! End-to-end CLI tests for the hostfetch binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Binary isolated from the user's config and accounts.
fn hostfetch(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hostfetch").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve and fetch files"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hostfetch"));
}

#[test]
fn test_binary_requires_subcommand() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path()).assert().failure();
}

#[test]
fn test_providers_lists_priority_order() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains(" 1. oboom.com"))
        .stdout(predicate::str::contains(" 8. basic"))
        .stdout(predicate::str::is_match(r"real-debrid\.com\s+retrieve, accounts, configure").unwrap());
}

#[test]
fn test_resolve_unsupported_scheme_fails() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .args(["-q", "resolve", "ftp://files.example.com/a.bin"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error\tftp://files.example.com/a.bin"))
        .stderr(predicate::str::contains("1 of 1 items could not be resolved"));
}

#[test]
fn test_resolve_invalid_url_fails() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .args(["resolve", "not a url"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid URL"));
}

#[test]
fn test_bad_config_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "max_depth = 500\n").unwrap();
    hostfetch(home.path())
        .args(["--config"])
        .arg(&config)
        .arg("providers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn test_accounts_list_empty() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts stored"));
}

#[test]
fn test_accounts_list_hides_secrets() {
    let home = tempfile::tempdir().unwrap();
    let accounts = home.path().join("accounts.json");
    std::fs::write(
        &accounts,
        r#"{"rapidgator.net": [{"username": "me@example.com", "password": "hunter2"}]}"#,
    )
    .unwrap();
    hostfetch(home.path())
        .arg("--accounts-file")
        .arg(&accounts)
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("me@example.com"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_accounts_add_unknown_provider_fails() {
    let home = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .args(["accounts", "add", "nosuch.example"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider 'nosuch.example'"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_and_get_generic_link() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("HEAD"))
        .and(path("/files/data.bin"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "3"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let link = format!("{}/files/data.bin", server.uri());

    hostfetch(home.path())
        .args(["resolve", &link])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolved\t"))
        .stdout(predicate::str::contains("\tdata.bin\t"))
        .stdout(predicate::str::contains("\tbasic"));

    let out = tempfile::tempdir().unwrap();
    hostfetch(home.path())
        .args(["get", "--no-progress", "-o"])
        .arg(out.path())
        .arg(&link)
        .assert()
        .success()
        .stdout(predicate::str::contains("saved\t"));
    assert_eq!(std::fs::read(out.path().join("data.bin")).unwrap(), b"abc");
}
