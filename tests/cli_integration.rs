//! End-to-end tests for the `polychat` binary
//!
//! Each test points the binary at a private database with
//! `--storage-path`, so runs never touch the user's data.

use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::polychat_cmd;

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn test_sessions_new_then_list() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["sessions", "new"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created session"));

    polychat_cmd(tmp.path())
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New Chat"));
}

#[test]
fn test_sessions_list_empty() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions yet."));
}

#[test]
fn test_select_unknown_session_fails() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["sessions", "select", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found"));
}

#[test]
fn test_models_add_and_list() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["models", "add", "acme/custom-model"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added model acme/custom-model"));

    polychat_cmd(tmp.path())
        .args(["models", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/custom-model"))
        .stdout(predicate::str::contains("custom"));
}

#[test]
fn test_settings_rejects_negative_cost() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["settings", "set-cost", "--", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_settings_show_masks_key() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["settings", "set-key", "sk-or-secret-9876"])
        .assert()
        .success();

    polychat_cmd(tmp.path())
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********9876"))
        .stdout(predicate::str::contains("sk-or-secret").not());
}

#[test]
fn test_ask_without_key_fails() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["ask", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn test_export_then_import_round_trip() {
    let source = TempDir::new().unwrap();
    polychat_cmd(source.path())
        .args(["sessions", "new"])
        .assert()
        .success();

    let export_path = source.path().join("out/export.json");
    polychat_cmd(source.path())
        .args(["export", "--all", "--output"])
        .arg(&export_path)
        .assert()
        .success();

    let bundle: Value =
        serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(bundle["version"], 1);
    assert_eq!(bundle["app"], "PolyModel Chat");
    assert_eq!(bundle["sessions"].as_array().unwrap().len(), 1);

    let target = TempDir::new().unwrap();
    polychat_cmd(target.path())
        .arg("import")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 chat"));
}

#[test]
fn test_import_rejects_unrecognized_payload() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.json");
    std::fs::write(&path, r#"{"foo": 1}"#).unwrap();

    polychat_cmd(tmp.path())
        .arg("import")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Import failed"));
}

#[test]
fn test_export_markdown_to_stdout() {
    let tmp = TempDir::new().unwrap();
    polychat_cmd(tmp.path())
        .args(["sessions", "new"])
        .assert()
        .success();

    polychat_cmd(tmp.path())
        .args(["export", "--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# New Chat"));
}

#[test]
fn test_invalid_endpoint_in_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_config_dir, config_path) = common::temp_config_file("api:\n  endpoint: not a url\n");

    common::polychat_cmd_with_config(tmp.path(), &config_path)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid api.endpoint"));
}

#[tokio::test]
async fn test_ask_streams_reply_to_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                common::sse_body(&["Hello", " from", " the mock"]).into_bytes(),
                "text/event-stream",
            ),
        )
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let endpoint = format!("{}{}", server.uri(), common::COMPLETIONS_PATH);
    let dir = tmp.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        polychat_cmd(&dir)
            .args(["settings", "set-key", "sk-test"])
            .assert()
            .success();
        polychat_cmd(&dir)
            .env("POLYCHAT_API_ENDPOINT", endpoint)
            .args(["ask", "Say hello"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Hello from the mock"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
