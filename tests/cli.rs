//! CLI test cases.
//!
//! These only cover what the binary can check locally. The server itself is
//! tested in-process, against a mock completion API.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// A 1x1 white PNG.
static BLANK_PNG: &str = "tests/fixtures/blank.png";

/// Nothing should ever listen here.
static UNUSED_SERVER: &str = "http://127.0.0.1:9";

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("ocr-answer").unwrap()
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_ask_without_file_is_rejected_locally() {
    cmd()
        .arg("ask")
        .args(["--server", UNUSED_SERVER])
        .args(["--prompt", "What is the total?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Please upload an image or document first.",
        ));
}

#[test]
fn test_ask_without_prompt_is_rejected_locally() {
    cmd()
        .arg("ask")
        .args(["--server", UNUSED_SERVER])
        .args(["--prompt", "   "])
        .arg(BLANK_PNG)
        .assert()
        .failure()
        .stderr(predicate::str::contains("blank.png"))
        .stderr(predicate::str::contains(
            "Please enter your question or prompt.",
        ));
}

#[test]
fn test_ask_with_unreachable_server_fails() {
    cmd()
        .arg("ask")
        .args(["--server", UNUSED_SERVER])
        .args(["--prompt", "What is this?"])
        .arg(BLANK_PNG)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_serve_requires_api_key() {
    cmd()
        .env_remove("OPENAI_API_KEY")
        .arg("serve")
        .args(["--listen", "127.0.0.1:0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}
