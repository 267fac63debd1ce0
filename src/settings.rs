//! Global settings persisted in the key-value store
//!
//! Selected model, API credential, the default cost per 1000 tokens used
//! for estimated cost labels, and the user's custom model list.

use std::sync::Arc;

use crate::error::{PolychatError, Result};
use crate::storage::{keys, read_json, write_json, KeyValueStore};

/// Built-in model ids, in display order
pub const MODELS: &[&str] = &[
    "meta-llama/llama-3.3-70b-instruct:free",
    "liquid/lfm-2.5-1.2b-instruct:free",
    "liquid/lfm-2.5-1.2b-thinking:free",
    "allenai/molmo-2-8b:free",
    "nvidia/nemotron-3-nano-30b-a3b:free",
    "tngtech/deepseek-r1t2-chimera:free",
    "tngtech/deepseek-r1t-chimera:free",
    "arcee-ai/trinity-mini:free",
    "openai/gpt-oss-20b:free",
];

/// Accessor for global settings
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
    default_model: String,
}

impl Settings {
    /// Create a settings view over `store`
    ///
    /// `default_model` is reported by [`Settings::selected_model`] until a
    /// model has been selected.
    pub fn new(store: Arc<dyn KeyValueStore>, default_model: impl Into<String>) -> Self {
        Self {
            store,
            default_model: default_model.into(),
        }
    }

    /// Currently selected model id
    pub fn selected_model(&self) -> Result<String> {
        let stored: Option<String> = read_json(self.store.as_ref(), keys::SELECTED_MODEL)?;
        Ok(stored
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone()))
    }

    /// Select the model used for new requests
    ///
    /// # Errors
    ///
    /// Returns `PolychatError::Validation` for an empty id
    pub fn set_selected_model(&self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(PolychatError::Validation("Model id cannot be empty".to_string()).into());
        }
        tracing::debug!("Selected model {}", model);
        write_json(self.store.as_ref(), keys::SELECTED_MODEL, model)
    }

    /// Stored API key, if any
    pub fn api_key(&self) -> Result<Option<String>> {
        let stored: Option<String> = read_json(self.store.as_ref(), keys::API_KEY)?;
        Ok(stored.filter(|k| !k.trim().is_empty()))
    }

    /// Stored API key, or `MissingCredentials`
    pub fn require_api_key(&self) -> Result<String> {
        self.api_key()?
            .ok_or_else(|| PolychatError::MissingCredentials.into())
    }

    /// Store the API key
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PolychatError::Validation("API key cannot be empty".to_string()).into());
        }
        write_json(self.store.as_ref(), keys::API_KEY, key)
    }

    /// Remove the stored API key
    pub fn clear_api_key(&self) -> Result<()> {
        self.store.remove(keys::API_KEY)
    }

    /// Default cost per 1000 tokens, in USD
    pub fn cost_per_1k(&self) -> Result<Option<f64>> {
        let stored: Option<f64> = read_json(self.store.as_ref(), keys::COST_PER_1K)?;
        Ok(stored.filter(|c| c.is_finite() && *c >= 0.0))
    }

    /// Set the default cost per 1000 tokens
    ///
    /// # Errors
    ///
    /// Returns `PolychatError::Validation` for negative or non-finite values
    pub fn set_cost_per_1k(&self, cost: f64) -> Result<()> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(PolychatError::Validation(format!(
                "Cost per 1K tokens must be a non-negative number, got {}",
                cost
            ))
            .into());
        }
        write_json(self.store.as_ref(), keys::COST_PER_1K, &cost)
    }

    /// Remove the default cost per 1000 tokens
    pub fn clear_cost_per_1k(&self) -> Result<()> {
        self.store.remove(keys::COST_PER_1K)
    }

    /// User-added model ids
    pub fn custom_models(&self) -> Result<Vec<String>> {
        Ok(read_json(self.store.as_ref(), keys::CUSTOM_MODELS)?.unwrap_or_default())
    }

    /// Add a custom model id
    ///
    /// Returns `false` when the id is empty, built in, or already present.
    pub fn add_custom_model(&self, id: &str) -> Result<bool> {
        let id = id.trim();
        if id.is_empty() || MODELS.contains(&id) {
            return Ok(false);
        }
        let mut models = self.custom_models()?;
        if models.iter().any(|m| m == id) {
            return Ok(false);
        }
        models.push(id.to_string());
        write_json(self.store.as_ref(), keys::CUSTOM_MODELS, &models)?;
        Ok(true)
    }

    /// Remove a custom model id; returns whether it was present
    pub fn remove_custom_model(&self, id: &str) -> Result<bool> {
        let mut models = self.custom_models()?;
        let before = models.len();
        models.retain(|m| m != id);
        if models.len() == before {
            return Ok(false);
        }
        write_json(self.store.as_ref(), keys::CUSTOM_MODELS, &models)?;
        Ok(true)
    }

    /// Built-in models followed by custom models
    pub fn all_models(&self) -> Result<Vec<String>> {
        let mut models: Vec<String> = MODELS.iter().map(|m| m.to_string()).collect();
        models.extend(self.custom_models()?);
        Ok(models)
    }
}
