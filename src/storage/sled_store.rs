//! On-disk key-value store backed by `sled`

use super::KeyValueStore;
use crate::error::{PolychatError, Result};
use directories::ProjectDirs;
use sled::Db;
use std::path::{Path, PathBuf};

/// Persistent [`KeyValueStore`] using an embedded `sled` database
///
/// Every write is flushed before returning so a crash after a finalized
/// message never loses it.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `PolychatError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::storage::{KeyValueStore, SledStore};
    ///
    /// # fn main() -> polychat::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let store = SledStore::open(dir.path().join("polychat.sled"))?;
    /// store.set("selected_model", "openai/gpt-oss-20b:free")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PolychatError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path)
            .map_err(|e| PolychatError::Storage(format!("Failed to open database: {}", e)))?;
        tracing::debug!("Opened key-value store at {}", path.display());
        Ok(Self { db })
    }

    /// Default database location in the user's data directory
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "polychat", "polychat").ok_or_else(|| {
            PolychatError::Storage("Could not determine data directory".to_string())
        })?;
        Ok(dirs.data_dir().join("polychat.sled"))
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| PolychatError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| PolychatError::Storage(format!("Get failed: {}", e)))?;

        match value {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    PolychatError::Storage(format!("Value for {} is not UTF-8: {}", key, e))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| PolychatError::Storage(format!("Insert failed: {}", e)))?;
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| PolychatError::Storage(format!("Remove failed: {}", e)))?;
        self.flush()
    }
}
