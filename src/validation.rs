use std::path::Path;

use crate::error::{ChatError, Result};

/// Maximum length of a project name, in characters
pub const MAX_PROJECT_NAME_LEN: usize = 100;

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate project name
    pub fn validate_project_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(invalid("Project name cannot be empty"));
        }

        if name.chars().count() > MAX_PROJECT_NAME_LEN {
            return Err(invalid(format!(
                "Project name too long (max {MAX_PROJECT_NAME_LEN} characters)"
            )));
        }

        if name.chars().any(char::is_control) {
            return Err(invalid("Project name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate sender identity
    pub fn validate_sender(sender: &str) -> Result<()> {
        if sender.trim().is_empty() {
            return Err(invalid("Sender cannot be empty"));
        }

        if sender.contains('\0') || sender.contains('\r') || sender.contains('\n') {
            return Err(invalid("Sender contains invalid characters"));
        }

        Ok(())
    }

    /// Validate an attachment path: it must name an existing regular file
    pub fn validate_attachment(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(invalid("Attachment path cannot be empty"));
        }

        if !path.is_file() {
            return Err(invalid(format!("Attachment is not a readable file: {}", path.display())));
        }

        Ok(())
    }

    /// Validate a message: text, an attachment, or both must be present
    pub fn validate_message(text: &str, attachment: Option<&Path>) -> Result<()> {
        if text.trim().is_empty() && attachment.is_none() {
            return Err(invalid("Message needs text or an attachment"));
        }
        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn invalid(message: impl Into<String>) -> ChatError {
    ChatError::InvalidInput(message.into())
}
