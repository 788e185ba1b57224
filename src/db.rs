use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::migrations;
use crate::models::{Message, MessageFields, MessageType, Project};
use crate::schema::{categories, messages, projects, DEFAULT_PROJECT};

/// Pool holding the store's single connection
pub type DbPool = Pool<SqliteConnectionManager>;
/// The checked-out shared connection
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Message and project store over one SQLite connection.
///
/// The pool is capped at a single connection that is opened at construction
/// and never recycled, so every call runs serially against the same
/// connection. Each mutating call commits on its own; there is no
/// transaction spanning calls.
pub struct Database {
    pool: DbPool,
    metrics: MetricsCollector,
}

impl Database {
    /// Open (or create) the store at `path` and initialize it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let defaults = crate::config::AppConfig::default().database;
        Self::open_with(path.as_ref(), &defaults)
    }

    /// Open the store described by a configuration section
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open_with(Path::new(&config.path), config)
    }

    /// Open a private in-memory store, mostly useful for tests
    pub fn in_memory() -> Result<Self> {
        let defaults = crate::config::AppConfig::default().database;
        let manager = SqliteConnectionManager::memory();
        Self::build(manager, &defaults)
    }

    fn open_with(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "opening database");
        Self::build(SqliteConnectionManager::file(path), config)
    }

    fn build(manager: SqliteConnectionManager, config: &DatabaseConfig) -> Result<Self> {
        let busy_timeout = Duration::from_secs(config.busy_timeout_secs);
        let manager = manager.with_init(move |conn| conn.busy_timeout(busy_timeout));

        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)?;

        let database = Self {
            pool,
            metrics: MetricsCollector::default(),
        };
        database.initialize()?;
        Ok(database)
    }

    /// Get the shared connection.
    ///
    /// Only one connection exists; drop it before calling other store
    /// methods or they will wait for it.
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    fn run<T>(&self, operation: &'static str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let timer = MetricsTimer::new(self.metrics, operation);
        let result = self.get_connection().and_then(|conn| f(&*conn));
        if let Err(e) = &result {
            tracing::warn!(operation, error = %e, "store operation failed");
        }
        timer.finish(result.is_ok());
        result
    }

    /// Bring the schema up to date and make sure the default project exists.
    ///
    /// Safe to call on every startup.
    pub fn initialize(&self) -> Result<()> {
        self.run("initialize", |conn| {
            let applied = migrations::run_migrations(conn)?;
            let created = insert_project(conn, DEFAULT_PROJECT)?;
            tracing::info!(migrations = applied.len(), created_default_project = created, "database initialized");
            Ok(())
        })
    }

    /// Add a column to a table if it is missing; returns whether the schema changed
    pub fn ensure_column(&self, table: &str, column: &str, type_and_default: &str) -> Result<bool> {
        self.run("ensure_column", |conn| migrations::ensure_column(conn, table, column, type_and_default))
    }

    /// Insert a message and return its id.
    ///
    /// Only the fields set in `fields` are written; the rest take their
    /// column defaults. A named project that does not exist yet is created.
    pub fn insert_message(&self, sender: &str, message: &str, fields: &MessageFields) -> Result<i64> {
        self.run("insert_message", |conn| {
            let mut columns = vec![messages::SENDER, messages::MESSAGE];
            let mut values = vec![Value::from(sender.to_string()), Value::from(message.to_string())];

            if let Some(category) = &fields.category {
                columns.push(messages::CATEGORY);
                values.push(Value::from(category.clone()));
            }
            if let Some(message_type) = fields.message_type {
                columns.push(messages::MESSAGE_TYPE);
                values.push(Value::from(message_type.as_str().to_string()));
            }
            if let Some(project) = &fields.project {
                insert_project(conn, project)?;
                columns.push(messages::PROJECT);
                values.push(Value::from(project.clone()));
            }
            if let Some(file_path) = &fields.file_path {
                columns.push(messages::FILE_PATH);
                values.push(Value::from(file_path.clone()));
            }

            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let query = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                messages::TABLE,
                columns.join(", "),
                placeholders.join(", ")
            );
            conn.execute(&query, params_from_iter(values))?;

            let id = conn.last_insert_rowid();
            self.metrics.record_messages_written(1, "insert_message");
            tracing::debug!(id, sender, project = fields.project.as_deref().unwrap_or(DEFAULT_PROJECT), "inserted message");
            Ok(id)
        })
    }

    /// Messages in insertion order.
    ///
    /// `project = None` is the unfiltered view; otherwise only messages whose
    /// `project` column equals the name are returned. `limit` keeps the first
    /// `n` rows of that ordering.
    pub fn get_messages(&self, project: Option<&str>, limit: Option<u32>) -> Result<Vec<Message>> {
        self.run("get_messages", |conn| {
            let mut query = format!("SELECT * FROM {}", messages::TABLE);
            let mut values: Vec<Value> = Vec::new();

            if let Some(project) = project {
                values.push(Value::from(project.to_string()));
                query.push_str(&format!(" WHERE {} = ?{}", messages::PROJECT, values.len()));
            }

            query.push_str(&format!(" ORDER BY {} ASC", messages::ID));

            if let Some(limit) = limit {
                values.push(Value::from(i64::from(limit)));
                query.push_str(&format!(" LIMIT ?{}", values.len()));
            }

            query_messages(conn, &query, values)
        })
    }

    /// Messages whose body contains `term`, optionally within one project.
    ///
    /// Matching uses SQLite `LIKE`, so it ignores ASCII case. `%` and `_` in
    /// the term match literally.
    pub fn search_messages(&self, term: &str, project: Option<&str>) -> Result<Vec<Message>> {
        self.run("search_messages", |conn| {
            let mut query = format!(
                "SELECT * FROM {} WHERE {} LIKE ?1 ESCAPE '\\'",
                messages::TABLE,
                messages::MESSAGE
            );
            let mut values = vec![Value::from(format!("%{}%", escape_like(term)))];

            if let Some(project) = project {
                values.push(Value::from(project.to_string()));
                query.push_str(&format!(" AND {} = ?2", messages::PROJECT));
            }

            query.push_str(&format!(" ORDER BY {} ASC", messages::ID));
            query_messages(conn, &query, values)
        })
    }

    /// Get a message by ID
    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        self.run("get_message", |conn| {
            let message = conn
                .query_row(
                    &format!("SELECT * FROM {} WHERE {} = ?1", messages::TABLE, messages::ID),
                    params![id],
                    map_message,
                )
                .optional()?;
            Ok(message)
        })
    }

    /// Messages not yet classified, in insertion order
    pub fn get_unprocessed_messages(&self) -> Result<Vec<Message>> {
        self.run("get_unprocessed_messages", |conn| {
            let query = format!(
                "SELECT * FROM {table} WHERE {category} IS NULL OR {category} = ?1 ORDER BY {id} ASC",
                table = messages::TABLE,
                category = messages::CATEGORY,
                id = messages::ID
            );
            query_messages(conn, &query, vec![Value::from(categories::USER_MESSAGE.to_string())])
        })
    }

    /// Number of messages, optionally within one project
    pub fn count_messages(&self, project: Option<&str>) -> Result<i64> {
        self.run("count_messages", |conn| {
            let count = match project {
                Some(project) => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", messages::TABLE, messages::PROJECT),
                    params![project],
                    |row| row.get(0),
                )?,
                None => conn.query_row(&format!("SELECT COUNT(*) FROM {}", messages::TABLE), [], |row| {
                    row.get(0)
                })?,
            };
            Ok(count)
        })
    }

    /// Delete a message; returns whether a row was removed
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.run("delete_message", |conn| {
            let affected = conn.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", messages::TABLE, messages::ID),
                params![id],
            )?;
            tracing::debug!(id, deleted = affected > 0, "delete message");
            Ok(affected > 0)
        })
    }

    /// Move a message to another project, creating the project if needed.
    ///
    /// Returns whether a message row was updated.
    pub fn update_message_project(&self, id: i64, project: &str) -> Result<bool> {
        self.run("update_message_project", |conn| {
            if insert_project(conn, project)? {
                tracing::info!(project, "created project on message move");
            }

            let affected = conn.execute(
                &format!("UPDATE {} SET {} = ?1 WHERE {} = ?2", messages::TABLE, messages::PROJECT, messages::ID),
                params![project, id],
            )?;
            if affected > 0 {
                self.metrics.record_messages_written(1, "update_message_project");
            }
            Ok(affected > 0)
        })
    }

    /// Set or clear a message's category; returns whether a row was updated
    pub fn set_message_category(&self, id: i64, category: Option<&str>) -> Result<bool> {
        self.run("set_message_category", |conn| {
            let affected = conn.execute(
                &format!("UPDATE {} SET {} = ?1 WHERE {} = ?2", messages::TABLE, messages::CATEGORY, messages::ID),
                params![category, id],
            )?;
            Ok(affected > 0)
        })
    }

    /// All project names in lexicographic order
    pub fn get_projects(&self) -> Result<Vec<String>> {
        self.run("get_projects", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {name} FROM {table} ORDER BY {name} ASC",
                name = projects::NAME,
                table = projects::TABLE
            ))?;
            let name_iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut names = Vec::new();
            for name in name_iter {
                names.push(name?);
            }

            self.metrics.set_project_count(names.len());
            Ok(names)
        })
    }

    /// All projects with their metadata, ordered by name
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.run("list_projects", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} ORDER BY {} ASC",
                projects::TABLE,
                projects::NAME
            ))?;
            let project_iter = stmt.query_map([], map_project)?;

            let mut results = Vec::new();
            for project in project_iter {
                results.push(project?);
            }
            Ok(results)
        })
    }

    /// Create a project; returns `false` if the name is already taken
    pub fn create_project(&self, name: &str) -> Result<bool> {
        self.run("create_project", |conn| {
            let created = insert_project(conn, name)?;
            tracing::debug!(name, created, "create project");
            Ok(created)
        })
    }
}

fn insert_project(conn: &Connection, name: &str) -> Result<bool> {
    let affected = conn.execute(
        &format!("INSERT OR IGNORE INTO {} ({}) VALUES (?1)", projects::TABLE, projects::NAME),
        params![name],
    )?;
    Ok(affected == 1)
}

fn query_messages(conn: &Connection, query: &str, values: Vec<Value>) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(query)?;
    let message_iter = stmt.query_map(params_from_iter(values), map_message)?;

    let mut results = Vec::new();
    for message in message_iter {
        results.push(message?);
    }
    Ok(results)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Read a column that older tables may not have; missing reads as `None`
fn optional_column<T: FromSql>(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<T>>(name) {
        Err(rusqlite::Error::InvalidColumnName(_)) => Ok(None),
        other => other,
    }
}

/// Read a timestamp column leniently; values that do not parse read as `None`
fn optional_timestamp(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<NaiveDateTime>> {
    let value: Option<Value> = optional_column(row, name)?;
    Ok(value.and_then(|v| {
        let parsed = parse_timestamp(&v);
        if parsed.is_none() {
            tracing::debug!(column = name, value = ?v, "unreadable timestamp");
        }
        parsed
    }))
}

/// Accepts SQLite's `CURRENT_TIMESTAMP` text, ISO 8601 / RFC 3339 text, a bare
/// date, or integer Unix seconds
fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Integer(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        Value::Text(text) => {
            let text = text.trim();
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

/// Map a database row to a Message
fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let message_type: Option<String> = optional_column(row, messages::MESSAGE_TYPE)?;

    Ok(Message {
        id: row.get(messages::ID)?,
        sender: row.get(messages::SENDER)?,
        message: row.get(messages::MESSAGE)?,
        message_type: MessageType::from_tag(message_type.as_deref()),
        category: optional_column(row, messages::CATEGORY)?,
        project: optional_column(row, messages::PROJECT)?.unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
        file_path: optional_column(row, messages::FILE_PATH)?.unwrap_or_default(),
        timestamp: optional_timestamp(row, messages::TIMESTAMP)?,
    })
}

/// Map a database row to a Project
fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(projects::ID)?,
        name: row.get(projects::NAME)?,
        created_at: optional_timestamp(row, projects::CREATED_AT)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2023, 11, 14).and_then(|d| d.and_hms_opt(22, 13, 20));

        assert_eq!(parse_timestamp(&Value::Integer(1_700_000_000)), expected);
        assert_eq!(parse_timestamp(&Value::Text("2023-11-14 22:13:20".into())), expected);
        assert_eq!(parse_timestamp(&Value::Text("2023-11-14T22:13:20".into())), expected);
        assert_eq!(parse_timestamp(&Value::Text("2023-11-14T23:13:20+01:00".into())), expected);
        assert!(parse_timestamp(&Value::Text("2023-11-14 22:13:20.250".into())).is_some());
        assert_eq!(
            parse_timestamp(&Value::Text("2023-11-14".into())),
            NaiveDate::from_ymd_opt(2023, 11, 14).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp(&Value::Text("yesterday".into())), None);
        assert_eq!(parse_timestamp(&Value::Real(1.5)), None);
        assert_eq!(parse_timestamp(&Value::Null), None);
    }

    #[test]
    fn test_in_memory_store_starts_with_main() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_projects().unwrap(), vec!["main".to_string()]);
        assert!(db.get_messages(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.insert_message("You", "hello", &MessageFields::new()).unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.get_projects().unwrap(), vec!["main".to_string()]);
        assert_eq!(db.count_messages(None).unwrap(), 1);
    }
}
