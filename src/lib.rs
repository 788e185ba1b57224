//! Reminder Chat - project-scoped message store
//!
//! A Rust library for persisting chat messages grouped into named projects
//! in a local SQLite file, and for preparing classification payloads.
//!
//! # Features
//!
//! - Messages with optional attachments, categories and project assignment
//! - Idempotent, additive schema evolution for older databases
//! - Size-bounded text chunking with reserved shared context
//! - Write-back of classifier answers (project moves and reminders)

/// Size-bounded text chunking
pub mod chunker;
/// Classifier payloads and write-back
pub mod classification;
/// Configuration management
pub mod config;
/// Message and project store
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Ordered schema migrations
pub mod migrations;
/// Data models and structures
pub mod models;
/// Database schema definitions
pub mod schema;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use chunker::{chunk_lines, chunk_text, Chunk, Chunker};
pub use db::Database;
pub use error::{ChatError, Result};
pub use models::{Message, MessageFields, MessageType, Project};
