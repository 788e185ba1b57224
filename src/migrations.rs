//! Database migration runner.
//!
//! Migrations are an ordered list of additive steps executed on every
//! [`Database::initialize`](crate::db::Database::initialize) call. Each step
//! inspects the live schema first, so it applies at most once and never
//! touches existing rows. Databases written by older releases (a `messages`
//! table with only `id`, `sender`, `message` and `timestamp`) gain the newer
//! columns with their declared defaults.

use rusqlite::{params, Connection};

use crate::error::{ChatError, Result};
use crate::schema::{messages, projects};

/// One additive schema change
#[derive(Debug, Clone, Copy)]
pub enum Migration {
    /// Create a table with its default layout if it is missing
    CreateTable {
        /// Table name
        table: &'static str,
        /// `CREATE TABLE IF NOT EXISTS` statement
        ddl: &'static str,
    },
    /// Add a column if it is missing
    AddColumn {
        /// Table name
        table: &'static str,
        /// Column name
        column: &'static str,
        /// SQL type and default, e.g. `TEXT DEFAULT 'main'`
        definition: &'static str,
    },
}

impl Migration {
    /// Short label used in logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("create table {table}"),
            Self::AddColumn { table, column, .. } => format!("add column {table}.{column}"),
        }
    }

    /// Apply the step if needed; returns whether the schema changed
    pub fn apply(&self, conn: &Connection) -> Result<bool> {
        match *self {
            Self::CreateTable { table, ddl } => {
                if table_exists(conn, table)? {
                    return Ok(false);
                }
                conn.execute_batch(ddl)?;
                Ok(true)
            }
            Self::AddColumn { table, column, definition } => ensure_column(conn, table, column, definition),
        }
    }
}

/// Steps applied in order at startup.
pub const MIGRATIONS: &[Migration] = &[
    Migration::CreateTable { table: messages::TABLE, ddl: messages::CREATE },
    Migration::CreateTable { table: projects::TABLE, ddl: projects::CREATE },
    Migration::AddColumn { table: messages::TABLE, column: messages::CATEGORY, definition: "TEXT" },
    Migration::AddColumn {
        table: messages::TABLE,
        column: messages::MESSAGE_TYPE,
        definition: "TEXT DEFAULT 'text'",
    },
    Migration::AddColumn {
        table: messages::TABLE,
        column: messages::PROJECT,
        definition: "TEXT DEFAULT 'main'",
    },
    Migration::AddColumn {
        table: messages::TABLE,
        column: messages::FILE_PATH,
        definition: "TEXT DEFAULT ''",
    },
];

/// Run all pending migrations against the open connection.
///
/// Returns the labels of the steps that changed the schema.
pub fn run_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut applied = Vec::new();

    for step in MIGRATIONS {
        if step.apply(conn)? {
            tracing::info!(step = %step.describe(), "applied migration");
            applied.push(step.describe());
        }
    }

    tracing::debug!(applied = applied.len(), total = MIGRATIONS.len(), "migrations checked");
    Ok(applied)
}

/// Check that a name is a plain SQL identifier.
///
/// Table and column names cannot be bound as parameters, so anything that ends
/// up formatted into a statement goes through here first.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ChatError::Constraint(format!("invalid SQL identifier: {name:?}")))
    }
}

/// Whether a table exists in the main schema
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Column names of a table in declaration order (empty if the table is missing)
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    validate_identifier(table)?;

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>("name"))?;

    let mut columns = Vec::new();
    for name in names {
        columns.push(name?);
    }
    Ok(columns)
}

/// Add `column` to `table` unless it is already present.
///
/// Returns `true` if the column was added. Calling it again with the same
/// arguments is a no-op. Column names compare case-insensitively, as SQLite
/// does. A `;` is allowed inside quoted literals of `definition` only.
pub fn ensure_column(conn: &Connection, table: &str, column: &str, definition: &str) -> Result<bool> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    if has_unquoted_semicolon(definition) {
        return Err(ChatError::Constraint(format!("invalid column definition: {definition:?}")));
    }

    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Err(ChatError::Constraint(format!("no such table: {table}")));
    }
    if columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
        return Ok(false);
    }

    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"), [])?;
    tracing::debug!(table, column, definition, "added column");
    Ok(true)
}

/// A `;` outside `'...'` or `"..."` would end the statement
fn has_unquoted_semicolon(definition: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in definition.chars() {
        match (quote, c) {
            (None, ';') => return true,
            (None, '\'' | '"') => quote = Some(c),
            // A doubled quote reopens immediately, so toggling handles escapes
            (Some(open), _) if c == open => quote = None,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("messages").is_ok());
        assert!(validate_identifier("_private2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("name; DROP TABLE messages").is_err());
    }

    #[test]
    fn test_fresh_database_runs_every_create_step() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = run_migrations(&conn).unwrap();
        assert!(applied.contains(&"create table messages".to_string()));
        assert!(applied.contains(&"create table projects".to_string()));
        // The default layout already has these columns, only category is added.
        assert_eq!(
            applied.iter().filter(|s| s.starts_with("add column")).collect::<Vec<_>>(),
            vec!["add column messages.category"]
        );

        assert!(run_migrations(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_has_unquoted_semicolon() {
        assert!(!has_unquoted_semicolon("TEXT DEFAULT 'a;b'"));
        assert!(!has_unquoted_semicolon("TEXT DEFAULT 'it''s;'"));
        assert!(has_unquoted_semicolon("TEXT; DROP TABLE messages"));
        assert!(has_unquoted_semicolon("TEXT DEFAULT 'a'; DROP TABLE messages"));
    }

    #[test]
    fn test_ensure_column_is_case_insensitive() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert!(!ensure_column(&conn, "messages", "Project", "TEXT").unwrap());
        assert!(!ensure_column(&conn, "MESSAGES", "FILE_PATH", "TEXT").unwrap());
    }

    #[test]
    fn test_ensure_column_allows_quoted_semicolon() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute("INSERT INTO messages (sender, message) VALUES ('You', 'hi')", []).unwrap();
        assert!(ensure_column(&conn, "messages", "note", "TEXT DEFAULT 'a;b'").unwrap());

        let note: String = conn.query_row("SELECT note FROM messages", [], |row| row.get(0)).unwrap();
        assert_eq!(note, "a;b");
    }

    #[test]
    fn test_ensure_column_unknown_table() {
        let conn = Connection::open_in_memory().unwrap();
        let err = ensure_column(&conn, "nowhere", "x", "TEXT").unwrap_err();
        assert!(matches!(err, ChatError::Constraint(_)));
    }
}
