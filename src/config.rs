use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::error::{ChatError, Result};

/// Environment variable prefix; nested keys use `__`, e.g.
/// `REMINDER_CHAT_DATABASE__PATH=/tmp/chat.db`.
pub const ENV_PREFIX: &str = "REMINDER_CHAT";

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store settings
    pub database: DatabaseConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Classification payload settings
    pub classification: ClassificationConfig,
}

/// Store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite file
    pub path: String,
    /// How long SQLite waits on a locked database
    pub busy_timeout_secs: u64,
    /// How long to wait for the shared connection
    pub connection_timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "reminder_chat=debug"
    pub level: String,
    /// Optional log file; rotated daily
    pub file_path: Option<String>,
    /// "text" or "json"
    pub format: String,
}

/// Classification payload settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Maximum characters per outbound chunk, shared context included
    pub chunk_size: usize,
    /// Messages listed per project in the shared context
    pub context_messages_per_project: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "chat.db".to_string(),
                busy_timeout_secs: 5,
                connection_timeout_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            classification: ClassificationConfig {
                chunk_size: DEFAULT_CHUNK_SIZE,
                context_messages_per_project: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally layering an explicit file over the
    /// conventional `config/` files and under environment variables.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let app_config: Self = builder
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database config
        if self.database.path.trim().is_empty() {
            return Err(ChatError::Config("database.path cannot be empty".to_string()));
        }
        if self.database.connection_timeout_secs == 0 {
            return Err(ChatError::Config(
                "connection_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate logging config
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ChatError::Config(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ChatError::Config("logging.level cannot be empty".to_string()));
        }

        // Validate classification config
        if self.classification.chunk_size == 0 {
            return Err(ChatError::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.classification.context_messages_per_project == 0 {
            return Err(ChatError::Config(
                "context_messages_per_project must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
