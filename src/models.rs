//! Data models for messages and projects
//!
//! This module contains the records hydrated from the store and the
//! optional-fields struct used when inserting messages.

use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of content a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text
    #[default]
    Text,
    /// Image attachment
    Image,
    /// PDF attachment
    Pdf,
    /// Any other attachment
    File,
}

impl MessageType {
    /// Extensions treated as images when classifying attachments
    pub const IMAGE_EXTENSIONS: [&'static str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

    /// Tag stored in the `message_type` column
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::File => "file",
        }
    }

    /// Map a stored tag back to a type.
    ///
    /// A missing or empty tag reads as `Text`; unknown tags read as `File`.
    #[must_use]
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("" | "text") => Self::Text,
            Some("image") => Self::Image,
            Some("pdf") => Self::Pdf,
            Some(_) => Self::File,
        }
    }

    /// Classify an attachment by its file extension (case-insensitive)
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if ext == "pdf" {
            Self::Pdf
        } else {
            Self::File
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted chat entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Database primary key
    pub id: i64,
    /// Sender identity, e.g. "You" or "Bot"
    pub sender: String,
    /// Message body
    pub message: String,
    /// Kind of content
    pub message_type: MessageType,
    /// Optional classification
    pub category: Option<String>,
    /// Owning project name
    pub project: String,
    /// Attached file path, empty if none
    pub file_path: String,
    /// Creation time as recorded by the store
    pub timestamp: Option<NaiveDateTime>,
}

impl Message {
    /// True when the message references an attached file
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        !self.file_path.is_empty()
    }
}

/// A named partition of messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Database primary key
    pub id: i64,
    /// Unique, case-sensitive name
    pub name: String,
    /// Creation time
    pub created_at: Option<NaiveDateTime>,
}

/// Optional columns supplied on insert.
///
/// Fields left as `None` are not written, so the table default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFields {
    /// Classification
    pub category: Option<String>,
    /// Kind of content
    pub message_type: Option<MessageType>,
    /// Target project (created if absent)
    pub project: Option<String>,
    /// Attached file path
    pub file_path: Option<String>,
}

impl MessageFields {
    /// Start with every field unset
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the category
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the message type
    #[must_use]
    pub const fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }

    /// Set the target project
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Attach a file, deriving the message type from its extension
    #[must_use]
    pub fn attachment(mut self, path: &Path) -> Self {
        self.message_type = Some(MessageType::from_path(path));
        self.file_path = Some(path.to_string_lossy().into_owned());
        self
    }
}
