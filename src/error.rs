//! Error types for PolyChat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for PolyChat operations
///
/// This enum covers configuration loading, the storage backend, the
/// streaming completion engine, session management and import payloads.
#[derive(Error, Debug)]
pub enum PolychatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Caller supplied input that cannot be acted on (empty text, bad value)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No session with the given id exists in the registry
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No credential is configured for the completion endpoint
    #[error("No API key configured. Set one with `polychat settings set-key <KEY>`")]
    MissingCredentials,

    /// Non-success response from the completion endpoint
    ///
    /// Displays the server-provided message verbatim so it can be shown to
    /// the user as the content of an error message.
    #[error("{message}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// Server message, or a generic status-code message
        message: String,
    },

    /// Failure while reading the response body stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Import payload could not be used
    #[error("Import failed: {0}")]
    Import(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PolychatError {
    /// Build the error for a non-success completion response
    ///
    /// Uses `error.message` from a JSON body when present, otherwise a
    /// generic message naming the status code.
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::error::PolychatError;
    ///
    /// let err = PolychatError::api_from_body(401, r#"{"error":{"message":"No auth"}}"#);
    /// assert_eq!(err.to_string(), "No auth");
    ///
    /// let err = PolychatError::api_from_body(502, "<html>bad gateway</html>");
    /// assert_eq!(err.to_string(), "API Error: 502");
    /// ```
    pub fn api_from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("API Error: {}", status));

        Self::Api { status, message }
    }
}

/// Result type alias for PolyChat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
