//! Key-value storage backend
//!
//! All persisted state (session registry, per-session messages and system
//! prompts, settings) goes through the [`KeyValueStore`] trait so the rest of
//! the crate never touches a concrete database. [`SledStore`] persists to disk;
//! [`MemoryStore`] backs tests.
//!
//! The backend is treated as a synchronous, single-writer store. No locking
//! or transactions are layered on top: last write wins.

use crate::error::{PolychatError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod keys;
pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Minimal string key-value interface used for all persistence
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and deserialize a JSON value stored under `key`
///
/// Returns `Ok(None)` when the key is absent. A value that exists but fails
/// to deserialize is reported as a storage error rather than silently
/// replaced, so a corrupt record is never overwritten by accident.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => {
            let value = serde_json::from_str(&raw).map_err(|e| {
                PolychatError::Storage(format!("Failed to decode value for {}: {}", key, e))
            })?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serialize `value` as JSON and store it under `key`
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| PolychatError::Storage(format!("Failed to encode value for {}: {}", key, e)))?;
    store.set(key, &raw)
}
