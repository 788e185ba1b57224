//! Payload preparation and write-back for the external message classifier.
//!
//! The classifier itself lives outside this crate. This module builds what it
//! is sent (shared project context plus chunked listings of unclassified
//! messages) and applies what it answers through the regular store
//! operations.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunker;
use crate::config::ClassificationConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Message, MessageFields};
use crate::schema::categories;
use crate::validation::InputValidator;

/// Sender used for messages the application writes on its own
pub const BOT_SENDER: &str = "Bot";

const INSTRUCTIONS: &str = "\
Classify each message below. Answer with a JSON array of objects of the form
{\"message_id\": <id>, \"project\": <existing or new project name>} or
{\"message_id\": <id>, \"reminder_at\": \"YYYY-MM-DDTHH:MM:SS\", \"note\": <text>}.
Known projects and their first messages:";

/// Projects followed by their first `per_project` messages, as
/// `- sender: message` lines with a blank line after each project
pub fn project_digest(db: &Database, per_project: u32) -> Result<String> {
    let mut lines = Vec::new();

    for project in db.get_projects()? {
        lines.push(format!("Project: {project}"));
        for message in db.get_messages(Some(&project), Some(per_project))? {
            lines.push(format!("- {}: {}", message.sender, single_line(&message.message)));
        }
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}

/// One line per message so chunk boundaries fall between messages
#[must_use]
pub fn message_listing(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .map(|m| {
            format!(
                "[{}] project={} sender={}: {}",
                m.id,
                m.project,
                m.sender,
                single_line(&m.message)
            )
        })
        .collect()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything the classifier is sent for one run
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRequest {
    /// Shared context prepended to every chunk
    pub context: String,
    /// Ready-to-send payloads, context included
    pub payloads: Vec<String>,
    /// Ids of the messages covered by the payloads
    pub message_ids: Vec<i64>,
}

impl ClassificationRequest {
    /// Build the payloads for every unclassified message.
    ///
    /// Fails with a configuration error when the shared context alone does
    /// not fit in `config.chunk_size`.
    pub fn build(db: &Database, config: &ClassificationConfig) -> Result<Self> {
        let digest = project_digest(db, config.context_messages_per_project)?;
        let context = format!("{INSTRUCTIONS}\n{digest}\nMessages:\n");
        let chunker = Chunker::with_extra(config.chunk_size, context.clone())?;

        let pending = db.get_unprocessed_messages()?;
        let chunks = chunker.chunk_lines(&message_listing(&pending));

        tracing::info!(messages = pending.len(), chunks = chunks.len(), "built classification request");

        Ok(Self {
            payloads: chunker.payloads(&chunks),
            message_ids: pending.iter().map(|m| m.id).collect(),
            context,
        })
    }
}

/// One entry of the classifier's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Message being classified
    pub message_id: i64,
    /// Project the message belongs to
    #[serde(default)]
    pub project: Option<String>,
    /// When to remind about the message
    #[serde(default)]
    pub reminder_at: Option<NaiveDateTime>,
    /// Reminder text; defaults to the message body
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Response {
    List(Vec<Classification>),
    Wrapped { classifications: Vec<Classification> },
}

/// Parse the classifier's answer.
///
/// Accepts a bare JSON array or `{"classifications": [...]}`, optionally
/// wrapped in a Markdown code fence.
pub fn parse_classifications(raw: &str) -> Result<Vec<Classification>> {
    let body = strip_code_fence(raw);
    let response: Response = serde_json::from_str(body)?;
    Ok(match response {
        Response::List(items) | Response::Wrapped { classifications: items } => items,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Counts from [`apply_classifications`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Messages moved to a project
    pub moved: usize,
    /// Reminder messages written
    pub reminders: usize,
    /// Entries that referenced unknown messages or carried nothing usable
    pub skipped: usize,
}

/// Write classifier results back to the store.
///
/// Project entries move the message (creating the project if needed);
/// reminder entries add a Bot message in the message's project. Each
/// message that was acted on is marked classified.
pub fn apply_classifications(db: &Database, items: &[Classification]) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();

    for item in items {
        let Some(source) = db.get_message(item.message_id)? else {
            tracing::warn!(message_id = item.message_id, "classification for unknown message");
            summary.skipped += 1;
            continue;
        };

        let mut project = source.project.clone();
        let mut acted = false;

        if let Some(target) = item.project.as_deref().map(str::trim) {
            match InputValidator::validate_project_name(target) {
                Ok(()) => {
                    db.update_message_project(source.id, target)?;
                    project = target.to_string();
                    summary.moved += 1;
                    acted = true;
                }
                Err(e) => tracing::warn!(message_id = source.id, error = %e, "ignoring project assignment"),
            }
        }

        if let Some(at) = item.reminder_at {
            let note = item.note.as_deref().unwrap_or(&source.message);
            let text = format!("Reminder ({}): {}", at.format("%Y-%m-%d %H:%M"), note);
            db.insert_message(
                BOT_SENDER,
                &text,
                &MessageFields::new().category(categories::REMINDER).project(project.clone()),
            )?;
            summary.reminders += 1;
            acted = true;
        }

        if acted {
            db.set_message_category(source.id, Some(categories::CLASSIFIED))?;
        } else {
            summary.skipped += 1;
        }
    }

    tracing::info!(moved = summary.moved, reminders = summary.reminders, skipped = summary.skipped, "applied classifications");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  [1] "), "[1]");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("buy\nmilk  today"), "buy milk today");
    }
}
