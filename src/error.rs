//! Error types for the reminder-chat library.
//!
//! This module provides the crate error type using `thiserror`. Storage
//! failures (SQLite, connection pool, file system) are grouped by
//! [`ChatError::is_storage`] so callers can treat them as one kind.

use thiserror::Error;

/// Errors that can occur in the reminder-chat library.
#[derive(Error, Debug)]
pub enum ChatError {
    /// SQLite errors
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write referenced an unknown column or violated uniqueness
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Invalid configuration (including chunker settings)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChatError {
    /// True for failures of the underlying database, pool or file system.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Pool(_) | Self::Io(_))
    }
}

/// Convenience type alias for Result with ChatError
pub type Result<T> = std::result::Result<T, ChatError>;

impl From<config::ConfigError> for ChatError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kinds() {
        let err = ChatError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is_storage());

        let err = ChatError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.is_storage());

        assert!(!ChatError::Config("bad".to_string()).is_storage());
        assert!(!ChatError::Constraint("dup".to_string()).is_storage());
    }

    #[test]
    fn test_display() {
        let err = ChatError::Config("chunk_size must be greater than 0".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: chunk_size must be greater than 0");
    }
}
