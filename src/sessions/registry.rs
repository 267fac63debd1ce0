//! Session registry
//!
//! Session metadata, the active-session pointer, and the per-session
//! records (message list, system prompt) all live in the key-value store.
//! The registry holds no state of its own, so several registries over the
//! same store always agree.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::{parse_import, ExportBundle, SessionSnapshot};
use crate::chat::{derive_title, new_id, now_millis, Message, DEFAULT_TITLE, IMPORTED_TITLE};
use crate::error::{PolychatError, Result};
use crate::storage::{keys, read_json, write_json, KeyValueStore};

/// Session metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque unique id
    pub id: String,
    /// Display title, at most 36 characters
    pub title: String,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
}

/// Session lifecycle over a [`KeyValueStore`]
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRegistry {
    /// Create a registry over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All sessions, newest first
    pub fn list(&self) -> Result<Vec<Session>> {
        Ok(read_json(self.store.as_ref(), keys::SESSIONS)?.unwrap_or_default())
    }

    fn save_list(&self, sessions: &[Session]) -> Result<()> {
        write_json(self.store.as_ref(), keys::SESSIONS, sessions)
    }

    /// Look up a session
    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.list()?.into_iter().find(|s| s.id == id))
    }

    /// Look up a session, failing with `SessionNotFound`
    pub fn require(&self, id: &str) -> Result<Session> {
        self.get(id)?
            .ok_or_else(|| PolychatError::SessionNotFound(id.to_string()).into())
    }

    /// Id of the active session, if it still exists
    pub fn active_id(&self) -> Result<Option<String>> {
        let active: Option<String> = read_json(self.store.as_ref(), keys::ACTIVE_SESSION)?;
        match active {
            Some(id) if self.get(&id)?.is_some() => Ok(Some(id)),
            _ => Ok(None),
        }
    }

    /// The active session, if any
    pub fn active(&self) -> Result<Option<Session>> {
        match self.active_id()? {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    /// Create an empty session and make it active
    pub fn create(&self) -> Result<Session> {
        let session = Session {
            id: new_id(),
            title: DEFAULT_TITLE.to_string(),
            created_at: now_millis(),
        };

        let mut sessions = self.list()?;
        sessions.insert(0, session.clone());
        self.save_list(&sessions)?;
        self.set_active(&session.id)?;

        tracing::info!("Created session {}", session.id);
        Ok(session)
    }

    /// Delete a session and everything it owns
    ///
    /// Clears the active pointer when the deleted session was active.
    /// Returns whether the session existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut sessions = self.list()?;
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        let existed = sessions.len() != before;

        if existed {
            self.save_list(&sessions)?;
        }
        self.store.remove(&keys::messages(id))?;
        self.store.remove(&keys::system_prompt(id))?;

        let active: Option<String> = read_json(self.store.as_ref(), keys::ACTIVE_SESSION)?;
        if active.as_deref() == Some(id) {
            self.store.remove(keys::ACTIVE_SESSION)?;
        }

        tracing::info!("Deleted session {} (existed: {})", id, existed);
        Ok(existed)
    }

    /// Make an existing session active
    ///
    /// # Errors
    ///
    /// Returns `PolychatError::SessionNotFound` for an unknown id
    pub fn select(&self, id: &str) -> Result<()> {
        self.require(id)?;
        self.set_active(id)
    }

    fn set_active(&self, id: &str) -> Result<()> {
        write_json(self.store.as_ref(), keys::ACTIVE_SESSION, id)
    }

    /// Rename a session, applying the title policy to `input`
    pub fn rename(&self, id: &str, input: &str) -> Result<Session> {
        let title = derive_title(input, DEFAULT_TITLE);
        self.update_title(id, &title)
    }

    /// Store `title` as-is
    pub fn update_title(&self, id: &str, title: &str) -> Result<Session> {
        let mut sessions = self.list()?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PolychatError::SessionNotFound(id.to_string()))?;
        session.title = title.to_string();
        let updated = session.clone();
        self.save_list(&sessions)?;
        Ok(updated)
    }

    /// Persisted history of a session
    pub fn messages(&self, id: &str) -> Result<Vec<Message>> {
        Ok(read_json(self.store.as_ref(), &keys::messages(id))?.unwrap_or_default())
    }

    /// Replace the persisted history of a session
    pub fn save_messages(&self, id: &str, messages: &[Message]) -> Result<()> {
        write_json(self.store.as_ref(), &keys::messages(id), messages)
    }

    /// System prompt of a session; empty when unset
    pub fn system_prompt(&self, id: &str) -> Result<String> {
        Ok(read_json(self.store.as_ref(), &keys::system_prompt(id))?.unwrap_or_default())
    }

    /// Set the system prompt of a session; an empty prompt removes it
    pub fn set_system_prompt(&self, id: &str, prompt: &str) -> Result<()> {
        self.require(id)?;
        if prompt.trim().is_empty() {
            self.store.remove(&keys::system_prompt(id))
        } else {
            write_json(self.store.as_ref(), &keys::system_prompt(id), prompt)
        }
    }

    /// Import sessions from an export payload
    ///
    /// Every imported session gets a new id. Imported sessions are
    /// prepended in payload order and the first becomes active. Returns the
    /// number of sessions imported.
    ///
    /// # Errors
    ///
    /// Returns `PolychatError::Import` when nothing is importable; the
    /// registry is left untouched in that case.
    pub fn import(&self, payload: &Value) -> Result<usize> {
        let imported = parse_import(payload)?;

        let mut created = Vec::with_capacity(imported.len());
        for entry in imported {
            let session = Session {
                id: new_id(),
                title: derive_title(&entry.title, IMPORTED_TITLE),
                created_at: entry.created_at,
            };
            self.save_messages(&session.id, &entry.messages)?;
            if !entry.system_prompt.trim().is_empty() {
                write_json(
                    self.store.as_ref(),
                    &keys::system_prompt(&session.id),
                    &entry.system_prompt,
                )?;
            }
            created.push(session);
        }

        let count = created.len();
        let first = created.first().map(|s| s.id.clone());
        let mut sessions = created;
        sessions.extend(self.list()?);
        self.save_list(&sessions)?;
        if let Some(id) = first {
            self.set_active(&id)?;
        }

        tracing::info!("Imported {} session(s)", count);
        Ok(count)
    }

    /// Snapshot of one session
    pub fn export(&self, id: &str) -> Result<SessionSnapshot> {
        let session = self.require(id)?;
        Ok(SessionSnapshot::new(
            session.title,
            session.created_at,
            self.system_prompt(id)?,
            &self.messages(id)?,
        ))
    }

    /// Bundle holding one session
    pub fn export_bundle(&self, id: &str) -> Result<ExportBundle> {
        Ok(ExportBundle::new(vec![self.export(id)?]))
    }

    /// Bundle holding every session
    pub fn export_all(&self) -> Result<ExportBundle> {
        let snapshots = self
            .list()?
            .iter()
            .map(|s| self.export(&s.id))
            .collect::<Result<Vec<_>>>()?;
        Ok(ExportBundle::new(snapshots))
    }
}
