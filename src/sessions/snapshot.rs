//! Portable session snapshots
//!
//! The export bundle is plain JSON:
//!
//! ```json
//! { "version": 1, "app": "PolyModel Chat", "exportedAt": "2026-01-01T00:00:00Z",
//!   "sessions": [{ "title": "...", "createdAt": 0, "systemPrompt": "", "messages": [] }] }
//! ```
//!
//! Import accepts that bundle, a single bare session object, or a bare
//! message array, and drops anything it cannot use message by message.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{new_id, now_millis, Message, Role, STREAMING_MESSAGE_ID};
use crate::engine::usage::normalize_usage;
use crate::error::{PolychatError, Result};

/// Bundle format version
pub const EXPORT_VERSION: u32 = 1;

/// Application name written into bundles
pub const APP_NAME: &str = "PolyModel Chat";

/// One session as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session title
    pub title: String,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    /// System prompt; empty when unset
    #[serde(default)]
    pub system_prompt: String,
    /// History in chronological order
    pub messages: Vec<Message>,
}

impl SessionSnapshot {
    /// Build a snapshot, leaving out the live streaming placeholder
    pub fn new(
        title: impl Into<String>,
        created_at: i64,
        system_prompt: impl Into<String>,
        messages: &[Message],
    ) -> Self {
        Self {
            title: title.into(),
            created_at,
            system_prompt: system_prompt.into(),
            messages: messages
                .iter()
                .filter(|m| m.id != STREAMING_MESSAGE_ID)
                .cloned()
                .collect(),
        }
    }
}

/// Top-level export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    /// Format version
    pub version: u32,
    /// Producing application
    pub app: String,
    /// RFC 3339 export time
    pub exported_at: String,
    /// Exported sessions
    pub sessions: Vec<SessionSnapshot>,
}

impl ExportBundle {
    /// Wrap snapshots in a bundle stamped with the current time
    pub fn new(sessions: Vec<SessionSnapshot>) -> Self {
        Self {
            version: EXPORT_VERSION,
            app: APP_NAME.to_string(),
            exported_at: Utc::now().to_rfc3339(),
            sessions,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A session recovered from an import payload, before it gets an id
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSession {
    /// Title as found in the payload (may be blank)
    pub title: String,
    /// Creation time; `now` when absent
    pub created_at: i64,
    /// System prompt; empty when absent
    pub system_prompt: String,
    /// Valid messages only
    pub messages: Vec<Message>,
}

/// Normalize any accepted import shape into sessions
///
/// # Errors
///
/// Returns `PolychatError::Import` when the shape is not recognized or no
/// session in it can be imported.
///
/// # Examples
///
/// ```
/// use polychat::sessions::snapshot::parse_import;
/// use serde_json::json;
///
/// let sessions = parse_import(&json!([
///     {"role": "user", "content": "hi"},
///     {"role": "robot", "content": "dropped"}
/// ])).unwrap();
/// assert_eq!(sessions.len(), 1);
/// assert_eq!(sessions[0].messages.len(), 1);
///
/// assert!(parse_import(&json!({"foo": 1})).is_err());
/// ```
pub fn parse_import(payload: &Value) -> Result<Vec<ImportedSession>> {
    let entries: Vec<ImportedSession> = match payload {
        Value::Object(object) => match object.get("sessions") {
            Some(Value::Array(sessions)) => sessions.iter().filter_map(parse_session).collect(),
            Some(_) => {
                return Err(
                    PolychatError::Import("`sessions` must be an array".to_string()).into(),
                )
            }
            None if object.contains_key("messages") => {
                parse_session(payload).into_iter().collect()
            }
            None => {
                return Err(PolychatError::Import("Unrecognized import format".to_string()).into())
            }
        },
        Value::Array(messages) => vec![ImportedSession {
            title: String::new(),
            created_at: now_millis(),
            system_prompt: String::new(),
            messages: parse_messages(messages),
        }],
        _ => return Err(PolychatError::Import("Unrecognized import format".to_string()).into()),
    };

    if entries.is_empty() {
        return Err(PolychatError::Import("No chats found to import".to_string()).into());
    }

    Ok(entries)
}

fn parse_session(entry: &Value) -> Option<ImportedSession> {
    let Some(object) = entry.as_object() else {
        tracing::warn!("Skipping import entry that is not an object");
        return None;
    };

    let messages = match object.get("messages") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(messages)) => parse_messages(messages),
        Some(_) => {
            tracing::warn!("Skipping import entry whose messages are not an array");
            return None;
        }
    };

    Some(ImportedSession {
        title: object
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at: object
            .get("createdAt")
            .and_then(coerce_millis)
            .unwrap_or_else(now_millis),
        system_prompt: object
            .get("systemPrompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        messages,
    })
}

fn parse_messages(values: &[Value]) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut dropped = 0usize;
    let messages: Vec<Message> = values
        .iter()
        .filter_map(|value| {
            let message = parse_message(value, &mut seen);
            if message.is_none() {
                dropped += 1;
            }
            message
        })
        .collect();

    if dropped > 0 {
        tracing::warn!("Dropped {} invalid message(s) during import", dropped);
    }
    messages
}

fn parse_message(value: &Value, seen: &mut HashSet<String>) -> Option<Message> {
    let object = value.as_object()?;
    let role = object.get("role").and_then(Value::as_str).and_then(Role::parse)?;
    let content = object.get("content")?.as_str()?.to_string();

    let id = match object.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() && id != STREAMING_MESSAGE_ID && !seen.contains(id) => {
            id.to_string()
        }
        _ => new_id(),
    };
    seen.insert(id.clone());

    let usage = object.get("usage").and_then(|u| {
        normalize_usage(u).map(|mut usage| {
            usage.estimated = u.get("estimated").and_then(Value::as_bool).unwrap_or(false);
            usage
        })
    });

    Some(Message {
        id,
        role,
        content,
        timestamp: object
            .get("timestamp")
            .and_then(coerce_millis)
            .unwrap_or_else(now_millis),
        model: object
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string),
        usage,
        cost_usd: object
            .get("costUsd")
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite() && *c >= 0.0),
    })
}

fn coerce_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Render a session as a Markdown transcript
///
/// # Examples
///
/// ```
/// use polychat::chat::Message;
/// use polychat::sessions::snapshot::{render_markdown, SessionSnapshot};
///
/// let snapshot = SessionSnapshot::new("Greetings", 0, "", &[Message::user("hello")]);
/// let md = render_markdown(&snapshot);
/// assert!(md.starts_with("# Greetings\n"));
/// assert!(md.contains("## User"));
/// ```
pub fn render_markdown(snapshot: &SessionSnapshot) -> String {
    let mut out = format!("# {}\n\n", snapshot.title);
    out.push_str(&format!("_Created {}_\n\n", format_millis(snapshot.created_at)));

    if !snapshot.system_prompt.trim().is_empty() {
        out.push_str("## System\n\n");
        out.push_str(snapshot.system_prompt.trim());
        out.push_str("\n\n");
    }

    for message in &snapshot.messages {
        let heading = match message.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Error => "Error",
        };
        out.push_str(&format!(
            "## {} ({})\n\n",
            heading,
            format_millis(message.timestamp)
        ));
        if let Some(model) = &message.model {
            out.push_str(&format!("_Model: {}_\n\n", model));
        }
        out.push_str(message.content.trim_end());
        out.push_str("\n\n");
    }

    out
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bundle_with_invalid_role() {
        let payload = json!({
            "version": 1,
            "app": "PolyModel Chat",
            "exportedAt": "2026-01-01T00:00:00Z",
            "sessions": [
                {"title": "One", "createdAt": 10, "messages": [
                    {"id": "a", "role": "user", "content": "hi", "timestamp": 11},
                    {"id": "b", "role": "assistant", "content": "hello", "timestamp": 12}
                ]},
                {"title": "Two", "messages": [
                    {"role": "user", "content": "q"},
                    {"role": "wizard", "content": "nope"},
                    {"role": "assistant", "content": 42}
                ]}
            ]
        });
        let sessions = parse_import(&payload).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].title, "One");
        assert_eq!(sessions[0].created_at, 10);
        assert_eq!(sessions[0].messages[0].id, "a");
        assert_eq!(sessions[1].messages.len(), 1);
        assert_eq!(sessions[1].messages[0].content, "q");
    }

    #[test]
    fn test_parse_bare_session_object() {
        let payload = json!({
            "title": "Solo",
            "systemPrompt": "be terse",
            "messages": [{"role": "error", "content": "API Error: 500"}]
        });
        let sessions = parse_import(&payload).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].system_prompt, "be terse");
        assert_eq!(sessions[0].messages[0].role, Role::Error);
    }

    #[test]
    fn test_parse_skips_bad_entries() {
        let payload = json!({"sessions": [
            "not a session",
            {"title": "bad", "messages": "nope"},
            {"title": "empty"}
        ]});
        let sessions = parse_import(&payload).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "empty");
        assert!(sessions[0].messages.is_empty());
    }

    #[test]
    fn test_parse_rejects_unusable_payloads() {
        for payload in [
            json!(null),
            json!("text"),
            json!({"hello": "world"}),
            json!({"sessions": {}}),
            json!({"sessions": []}),
            json!({"sessions": [1, 2]}),
        ] {
            let err = parse_import(&payload).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<PolychatError>(),
                    Some(PolychatError::Import(_))
                ),
                "payload: {}",
                payload
            );
        }
    }

    #[test]
    fn test_duplicate_and_missing_ids_regenerated() {
        let sessions = parse_import(&json!([
            {"id": "x", "role": "user", "content": "1"},
            {"id": "x", "role": "assistant", "content": "2"},
            {"id": "", "role": "user", "content": "3"},
            {"id": "streaming-msg", "role": "assistant", "content": "4"}
        ]))
        .unwrap();
        let ids: Vec<&str> = sessions[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids[0], "x");
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 4);
        assert!(!ids.contains(&"streaming-msg"));
    }

    #[test]
    fn test_message_metadata_preserved() {
        let sessions = parse_import(&json!([{
            "role": "assistant",
            "content": "ok",
            "timestamp": 5,
            "model": "m",
            "usage": {"promptTokens": 3, "completionTokens": 1, "totalTokens": 4, "estimated": true},
            "costUsd": 0.001
        }]))
        .unwrap();
        let msg = &sessions[0].messages[0];
        assert_eq!(msg.timestamp, 5);
        assert_eq!(msg.model.as_deref(), Some("m"));
        let usage = msg.usage.unwrap();
        assert_eq!(usage.total_tokens, Some(4));
        assert!(usage.estimated);
        assert_eq!(msg.cost_usd, Some(0.001));
    }

    #[test]
    fn test_snapshot_excludes_streaming_placeholder() {
        let mut placeholder = Message::assistant("partial");
        placeholder.id = STREAMING_MESSAGE_ID.to_string();
        let snapshot = SessionSnapshot::new("t", 0, "", &[Message::user("q"), placeholder]);
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[test]
    fn test_bundle_serialization_shape() {
        let bundle = ExportBundle::new(vec![SessionSnapshot::new("t", 1, "sys", &[])]);
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["app"], "PolyModel Chat");
        assert!(json["exportedAt"].is_string());
        assert_eq!(json["sessions"][0]["createdAt"], 1);
        assert_eq!(json["sessions"][0]["systemPrompt"], "sys");
    }

    #[test]
    fn test_exported_bundle_imports_back() {
        let mut answer = Message::assistant("pong");
        answer.model = Some("m".to_string());
        let bundle = ExportBundle::new(vec![SessionSnapshot::new(
            "Ping",
            7,
            "",
            &[Message::user("ping"), answer],
        )]);
        let value = serde_json::to_value(&bundle).unwrap();
        let sessions = parse_import(&value).unwrap();
        assert_eq!(sessions[0].title, "Ping");
        assert_eq!(sessions[0].messages, bundle.sessions[0].messages);
    }

    #[test]
    fn test_render_markdown() {
        let mut user = Message::user("What is 2+2?");
        user.timestamp = 0;
        let mut reply = Message::assistant("4");
        reply.timestamp = 1_000;
        reply.model = Some("openai/gpt-oss-20b:free".to_string());
        let snapshot = SessionSnapshot::new("Math", 0, "Answer briefly", &[user, reply]);

        let md = render_markdown(&snapshot);
        assert!(md.starts_with("# Math\n\n_Created 1970-01-01 00:00:00 UTC_"));
        assert!(md.contains("## System\n\nAnswer briefly\n\n"));
        assert!(md.contains("## User (1970-01-01 00:00:00 UTC)\n\nWhat is 2+2?\n\n"));
        assert!(md.contains("## Assistant (1970-01-01 00:00:01 UTC)\n\n_Model: openai/gpt-oss-20b:free_\n\n4\n\n"));
    }
}
