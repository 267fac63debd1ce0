use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polychat::config::ApiConfig;
use polychat::storage::SledStore;
use serde_json::json;
use tempfile::TempDir;

/// Path the mock servers answer on
#[allow(dead_code)]
pub const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

#[allow(dead_code)]
pub fn create_temp_store() -> (Arc<SledStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store =
        SledStore::open(tmp.path().join("polychat.sled")).expect("failed to open sled store");
    (Arc::new(store), tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// API config pointing at a mock server
#[allow(dead_code)]
pub fn api_config(server_uri: &str) -> ApiConfig {
    ApiConfig {
        endpoint: format!("{}{}", server_uri, COMPLETIONS_PATH),
        referer: Some("https://polychat.test".to_string()),
        ..ApiConfig::default()
    }
}

/// One `data:` event carrying a content delta
#[allow(dead_code)]
pub fn delta_event(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "choices": [{ "delta": { "content": content } }] })
    )
}

/// A complete event-stream body: one event per delta, then `[DONE]`
#[allow(dead_code)]
pub fn sse_body(deltas: &[&str]) -> String {
    let mut body: String = deltas.iter().map(|d| delta_event(d)).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

/// A body whose final event carries usage and cost
#[allow(dead_code)]
pub fn sse_body_with_usage(deltas: &[&str], prompt: u64, completion: u64, cost: f64) -> String {
    let mut body: String = deltas.iter().map(|d| delta_event(d)).collect();
    body.push_str(&format!(
        "data: {}\n\n",
        json!({
            "choices": [],
            "usage": {
                "prompt_tokens": prompt,
                "completion_tokens": completion,
                "total_tokens": prompt + completion,
                "cost": cost
            }
        })
    ));
    body.push_str("data: [DONE]\n\n");
    body
}

/// `polychat` binary bound to a private database and no config file
#[allow(dead_code)]
pub fn polychat_cmd(db_dir: &Path) -> assert_cmd::Command {
    polychat_cmd_with_config(db_dir, &db_dir.join("missing-config.yaml"))
}

/// `polychat` binary bound to a private database and the given config file
#[allow(dead_code)]
pub fn polychat_cmd_with_config(db_dir: &Path, config: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("polychat").expect("binary builds");
    cmd.env_remove("POLYCHAT_API_ENDPOINT")
        .env_remove("POLYCHAT_DEFAULT_MODEL")
        .env_remove("POLYCHAT_DB")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config)
        .arg("--storage-path")
        .arg(db_dir.join("db"));
    cmd
}
