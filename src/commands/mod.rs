/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`    : Interactive chat REPL and one-shot `ask`
- `sessions`: Session listing and lifecycle
- `transfer`: Export and import
- `settings`: Credential, model, cost and system prompt settings
- `models`  : Built-in and custom model list

Every handler works on an [`AppContext`] opened from the loaded
configuration.
*/

use std::sync::Arc;

use crate::config::Config;
use crate::engine::{CompletionEngine, StreamingEngine};
use crate::error::Result;
use crate::sessions::{Session, SessionRegistry};
use crate::settings::Settings;
use crate::storage::{KeyValueStore, SledStore};

pub mod chat;
pub mod models;
pub mod sessions;
pub mod settings;
pub mod special_commands;
pub mod transfer;

/// Everything a command needs: storage, registry, settings and engine
#[derive(Clone)]
pub struct AppContext {
    /// Loaded configuration
    pub config: Config,
    /// Session registry over the opened database
    pub registry: SessionRegistry,
    /// Settings over the opened database
    pub settings: Settings,
    /// Completion engine shared by every session
    pub engine: Arc<dyn CompletionEngine>,
}

impl AppContext {
    /// Open the configured database and build the engine
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the HTTP client
    /// cannot be built
    pub fn open(config: Config) -> Result<Self> {
        let path = config.storage.resolve_path()?;
        tracing::info!("Using database at {}", path.display());
        let store: Arc<dyn KeyValueStore> = Arc::new(SledStore::open(&path)?);
        let engine: Arc<dyn CompletionEngine> = Arc::new(StreamingEngine::new(&config.api)?);
        Ok(Self::with_parts(config, store, engine))
    }

    /// Assemble a context from explicit parts
    pub fn with_parts(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        engine: Arc<dyn CompletionEngine>,
    ) -> Self {
        let registry = SessionRegistry::new(Arc::clone(&store));
        let settings = Settings::new(store, config.chat.default_model.clone());
        Self {
            config,
            registry,
            settings,
            engine,
        }
    }

    /// Resolve the session a command should act on
    ///
    /// An explicit id must exist and becomes active. Without one, the active
    /// session is used, then the newest session, and finally a new session
    /// is created.
    pub fn resolve_session(&self, explicit: Option<&str>) -> Result<Session> {
        if let Some(id) = explicit {
            self.registry.select(id)?;
            return self.registry.require(id);
        }
        if let Some(session) = self.registry.active()? {
            return Ok(session);
        }
        if let Some(session) = self.registry.list()?.into_iter().next() {
            self.registry.select(&session.id)?;
            return Ok(session);
        }
        self.registry.create()
    }
}
