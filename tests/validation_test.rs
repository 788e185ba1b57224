//! Unit tests for input validation

use std::path::Path;

use reminder_chat::error::ChatError;
use reminder_chat::validation::{InputValidator, MAX_PROJECT_NAME_LEN};

#[test]
fn test_validate_project_name_valid() {
    assert!(InputValidator::validate_project_name("Work").is_ok());
    assert!(InputValidator::validate_project_name("Home renovation 2026").is_ok());
}

#[test]
fn test_validate_project_name_empty() {
    assert!(InputValidator::validate_project_name("").is_err());
    assert!(InputValidator::validate_project_name("   ").is_err());
}

#[test]
fn test_validate_project_name_length_limit() {
    let name = "a".repeat(MAX_PROJECT_NAME_LEN);
    assert!(InputValidator::validate_project_name(&name).is_ok());

    let long_name = "a".repeat(MAX_PROJECT_NAME_LEN + 1);
    assert!(matches!(
        InputValidator::validate_project_name(&long_name),
        Err(ChatError::InvalidInput(_))
    ));
}

#[test]
fn test_validate_project_name_with_control_characters() {
    assert!(InputValidator::validate_project_name("Work\nLife").is_err());
    assert!(InputValidator::validate_project_name("Work\0").is_err());
}

#[test]
fn test_validate_sender() {
    assert!(InputValidator::validate_sender("You").is_ok());
    assert!(InputValidator::validate_sender("").is_err());
    assert!(InputValidator::validate_sender("Bot\r\n").is_err());
}

#[test]
fn test_validate_message_needs_content() {
    assert!(InputValidator::validate_message("hello", None).is_ok());
    assert!(InputValidator::validate_message("", Some(Path::new("scan.pdf"))).is_ok());
    assert!(InputValidator::validate_message("  \n", None).is_err());
}

#[test]
fn test_validate_attachment() {
    let file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    assert!(InputValidator::validate_attachment(file.path()).is_ok());

    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    assert!(InputValidator::validate_attachment(dir.path()).is_err());
    assert!(InputValidator::validate_attachment(&dir.path().join("missing.png")).is_err());
    assert!(InputValidator::validate_attachment(Path::new("")).is_err());
}

#[test]
fn test_sanitize_text() {
    assert_eq!(InputValidator::sanitize_text("  hello\u{7}  "), "hello");
    assert_eq!(InputValidator::sanitize_text("line one\nline\ttwo"), "line one\nline\ttwo");
    assert_eq!(InputValidator::sanitize_text(""), "");
}
