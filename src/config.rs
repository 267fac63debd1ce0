//! Configuration management for PolyChat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{PolychatError, Result};
use crate::settings::MODELS;
use crate::storage::SledStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for PolyChat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chat defaults
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Chat completions URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Value sent as the `HTTP-Referer` header
    #[serde(default)]
    pub referer: Option<String>,

    /// Value sent as the `X-Title` header
    #[serde(default = "default_app_title")]
    pub app_title: Option<String>,

    /// TCP connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_app_title() -> Option<String> {
    Some("PolyModel Chat".to_string())
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            referer: None,
            app_title: default_app_title(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path; the platform data directory is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path
    ///
    /// # Errors
    ///
    /// Returns error if no path is configured and the platform data
    /// directory cannot be determined
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match self.path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => SledStore::default_path(),
        }
    }
}

/// Chat defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model used until one is selected
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_model() -> String {
    MODELS[0].to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PolychatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| PolychatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(endpoint) = std::env::var("POLYCHAT_API_ENDPOINT") {
            self.api.endpoint = endpoint;
        }

        if let Ok(model) = std::env::var("POLYCHAT_DEFAULT_MODEL") {
            self.chat.default_model = model;
        }

        if let Ok(timeout) = std::env::var("POLYCHAT_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.connect_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid POLYCHAT_CONNECT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(db) = std::env::var("POLYCHAT_DB") {
            self.storage.path = Some(db);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.api.endpoint).map_err(|e| {
            PolychatError::Config(format!(
                "Invalid api.endpoint '{}': {}",
                self.api.endpoint, e
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(PolychatError::Config(format!(
                "api.endpoint must use http or https, got {}",
                endpoint.scheme()
            ))
            .into());
        }

        if self.api.connect_timeout_seconds == 0 {
            return Err(PolychatError::Config(
                "connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.default_model.trim().is_empty() {
            return Err(
                PolychatError::Config("chat.default_model cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}
