//! Persisted key layout
//!
//! Global keys hold one value each; per-session keys are derived from the
//! session id so deleting a session can erase exactly what it owns.

/// Session registry list (`Vec<Session>`, newest first)
pub const SESSIONS: &str = "chat_sessions";

/// Id of the active session
pub const ACTIVE_SESSION: &str = "current_session_id";

/// Selected model id
pub const SELECTED_MODEL: &str = "selected_model";

/// Opaque bearer credential for the completion endpoint
pub const API_KEY: &str = "api_key";

/// Default cost per 1000 tokens, used for cost estimates
pub const COST_PER_1K: &str = "cost_per_1k";

/// User-added model ids
pub const CUSTOM_MODELS: &str = "custom_models";

/// Message list owned by a session
pub fn messages(session_id: &str) -> String {
    format!("chat_messages_{}", session_id)
}

/// System prompt owned by a session
pub fn system_prompt(session_id: &str) -> String {
    format!("chat_system_prompt_{}", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_session_keys_are_distinct() {
        assert_eq!(messages("abc"), "chat_messages_abc");
        assert_eq!(system_prompt("abc"), "chat_system_prompt_abc");
        assert_ne!(messages("abc"), messages("abd"));
    }
}
