//! PolyModel Chat - multi-model streaming chat library
//!
//! This library provides the core of the polychat CLI: persistent chat
//! sessions, a streaming completion client for OpenAI-compatible chat
//! endpoints, and export/import of conversations.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: Key-value persistence (sled on disk, in-memory for tests)
//! - `sessions`: Session registry, export bundles and import validation
//! - `chat`: Messages, observable chat state and the per-session conversation store
//! - `engine`: SSE decoding, usage accounting and the streaming completion client
//! - `settings`: API key, selected model, custom models and cost estimate
//! - `pricing`: Token and cost labels for replies
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use polychat::{Config, SessionRegistry};
//! use polychat::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));
//!     let session = registry.create()?;
//!     assert_eq!(registry.active_id()?, Some(session.id));
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod pricing;
pub mod sessions;
pub mod settings;
pub mod storage;

// Re-export commonly used types
pub use chat::{ConversationStore, Message, Role, TurnOutcome};
pub use config::Config;
pub use engine::{CompletionEngine, StreamingEngine};
pub use error::{PolychatError, Result};
pub use sessions::{Session, SessionRegistry};
pub use settings::Settings;

#[cfg(test)]
pub mod test_utils;
