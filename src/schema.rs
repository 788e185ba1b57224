//! Database schema definitions
//!
//! Constants for table and column names used with rusqlite, plus the DDL for
//! the default table layouts.

/// Messages table schema
pub mod messages {
    /// Table name
    pub const TABLE: &str = "messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Sender identity column ("You", "Bot", ...)
    pub const SENDER: &str = "sender";
    /// Message body column
    pub const MESSAGE: &str = "message";
    /// Message type tag column (text, image, pdf, file)
    pub const MESSAGE_TYPE: &str = "message_type";
    /// Free-text classification column
    pub const CATEGORY: &str = "category";
    /// Owning project name column
    pub const PROJECT: &str = "project";
    /// Attached file path column
    pub const FILE_PATH: &str = "file_path";
    /// Creation timestamp column
    pub const TIMESTAMP: &str = "timestamp";

    /// Default table layout for a fresh database.
    pub const CREATE: &str = "
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender TEXT NOT NULL,
            message TEXT NOT NULL,
            message_type TEXT DEFAULT 'text',
            project TEXT DEFAULT 'main',
            file_path TEXT DEFAULT '',
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        )";
}

/// Projects table schema
pub mod projects {
    /// Table name
    pub const TABLE: &str = "projects";
    /// Primary key column
    pub const ID: &str = "id";
    /// Unique project name column
    pub const NAME: &str = "name";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";

    /// Default table layout for a fresh database.
    pub const CREATE: &str = "
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )";
}

/// Name of the project every store starts with.
pub const DEFAULT_PROJECT: &str = "main";

/// Well-known values of the `category` column
pub mod categories {
    /// Written by the chat input; the message still awaits classification
    pub const USER_MESSAGE: &str = "user_message";
    /// The message has been assigned to a project by the classifier
    pub const CLASSIFIED: &str = "classified";
    /// A reminder generated from a classified message
    pub const REMINDER: &str = "reminder";
}
