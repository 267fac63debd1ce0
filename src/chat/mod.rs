//! Conversation model and per-session message handling
//!
//! - `title`: session title derivation
//! - `state`: observable state container
//! - `store`: the per-session [`ConversationStore`]

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ApiMessage, Usage};

pub mod state;
pub mod store;
pub mod title;

pub use state::{ChatPhase, ChatState, StateContainer, SubscriptionId};
pub use store::{ConversationStore, TurnOutcome, STREAMING_MESSAGE_ID};
pub use title::{derive_title, DEFAULT_TITLE, IMPORTED_TITLE};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the user
    User,
    /// Produced by the model
    Assistant,
    /// A failed request, shown in place of a reply
    Error,
}

impl Role {
    /// Parse a persisted role name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Role name used on the wire; the API has no error role
    pub fn api_role(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant | Self::Error => "assistant",
        }
    }

    /// Persisted role name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a session's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique within its session
    pub id: String,
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Model that produced an assistant reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Token accounting for an assistant reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Server-reported cost in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::chat::{Message, Role};
    ///
    /// let msg = Message::new(Role::User, "hello");
    /// assert_eq!(msg.role, Role::User);
    /// assert!(!msg.id.is_empty());
    /// ```
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            timestamp: now_millis(),
            model: None,
            usage: None,
            cost_usd: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an error message
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }

    /// Wire form of this message
    pub fn to_api(&self) -> ApiMessage {
        ApiMessage::new(self.role.api_role(), self.content.clone())
    }
}

/// Fresh opaque identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
