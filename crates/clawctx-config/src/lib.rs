#![deny(unsafe_code)]

//! Configuration loading and validation for clawctx.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure; the context engine reads its
//! [`ContextConfig`] section and the binary reads [`LoggingConfig`].
//!
//! ## TOML Example
//!
//! ```toml
//! [context]
//! workspace = "."
//! cache_dir = ".clawctx"
//! max_files = 5
//! char_budget = 3500
//! cache_capacity = 200
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context engine configuration.
    #[serde(default)]
    pub context: ContextConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Context engine configuration: where to index, where to keep state, and
/// the default retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Repository root to index.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Directory holding `context_index.json` and `query_cache.json`.
    /// Relative paths resolve against `workspace`.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Default maximum number of snippets per pack.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Default character budget per pack.
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,

    /// Maximum number of packs kept in the query cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            cache_dir: default_cache_dir(),
            max_files: default_max_files(),
            char_budget: default_char_budget(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl ContextConfig {
    /// The cache directory with relative paths anchored at the workspace.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            self.workspace.join(&self.cache_dir)
        }
    }
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".clawctx")
}

fn default_max_files() -> usize {
    5
}

fn default_char_budget() -> usize {
    3500
}

fn default_cache_capacity() -> usize {
    200
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = &self.context;
        if ctx.workspace.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "context.workspace must not be empty".to_string(),
            ));
        }
        if ctx.max_files == 0 {
            return Err(ConfigError::Validation(
                "context.max_files must be at least 1".to_string(),
            ));
        }
        if ctx.char_budget == 0 {
            return Err(ConfigError::Validation(
                "context.char_budget must be at least 1".to_string(),
            ));
        }
        if ctx.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "context.cache_capacity must be at least 1".to_string(),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                VALID_LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }
}
