//! Configuration management for chatstore
//!
//! This module handles loading, parsing, and validating store
//! configuration from YAML files with sensible defaults.

use crate::error::{ChatStoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the store
///
/// Holds limits on message logs and content size, defaults applied to
/// newly created sessions, and the snapshot storage location.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Hard limits on stored and transmitted data
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Defaults applied to newly created sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Snapshot storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Limits on message logs and request payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum messages kept per session; oldest are dropped FIFO on overflow
    #[serde(default = "default_max_messages_per_session")]
    pub max_messages_per_session: usize,

    /// Maximum length of a single message's content, in characters
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Maximum number of recent messages included in a transport request
    ///
    /// This trims only the request context; stored history is never
    /// truncated by this limit.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

fn default_max_messages_per_session() -> usize {
    500
}

fn default_max_content_length() -> usize {
    32_768
}

fn default_max_context_messages() -> usize {
    20
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_messages_per_session: default_max_messages_per_session(),
            max_content_length: default_max_content_length(),
            max_context_messages: default_max_context_messages(),
        }
    }
}

/// Defaults applied to newly created sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Title for sessions created without one
    #[serde(default = "default_session_title")]
    pub session_title: String,

    /// Session type for sessions created without one
    #[serde(default = "default_session_type")]
    pub session_type: String,

    /// Model requested from the transport when the session doesn't override it
    #[serde(default)]
    pub model: Option<String>,
}

fn default_session_title() -> String {
    "New Chat".to_string()
}

fn default_session_type() -> String {
    "chat".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            session_title: default_session_title(),
            session_type: default_session_type(),
            model: None,
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Explicit database path; when None the platform data directory is used
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ChatStoreError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatStoreError::Config` when any limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_messages_per_session == 0 {
            return Err(
                ChatStoreError::Config("max_messages_per_session must be > 0".to_string()).into(),
            );
        }
        if self.limits.max_content_length == 0 {
            return Err(
                ChatStoreError::Config("max_content_length must be > 0".to_string()).into(),
            );
        }
        if self.limits.max_context_messages == 0 {
            return Err(
                ChatStoreError::Config("max_context_messages must be > 0".to_string()).into(),
            );
        }
        Ok(())
    }
}
