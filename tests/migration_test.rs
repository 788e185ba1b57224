//! Schema evolution tests against databases written by older releases

use reminder_chat::db::Database;
use reminder_chat::migrations::{run_migrations, table_columns};
use reminder_chat::models::{MessageFields, MessageType};
use rusqlite::Connection;

fn legacy_database(path: &std::path::Path) {
    let conn = Connection::open(path).expect("Failed to create legacy database");
    conn.execute_batch(
        "CREATE TABLE messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender TEXT,
            message TEXT,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        INSERT INTO messages (sender, message) VALUES ('You', 'old note');
        INSERT INTO messages (sender, message) VALUES ('Bot', 'old reply');",
    )
    .expect("Failed to seed legacy database");
}

#[test]
fn test_legacy_table_is_upgraded_without_data_loss() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("legacy.db");
    legacy_database(&path);

    let db = Database::open(&path).expect("Failed to open legacy database");

    let messages = db.get_messages(None, None).expect("get messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message, "old note");
    assert_eq!(messages[1].sender, "Bot");
    for message in &messages {
        assert_eq!(message.message_type, MessageType::Text);
        assert_eq!(message.project, "main");
        assert_eq!(message.file_path, "");
        assert_eq!(message.category, None);
    }

    assert_eq!(db.get_messages(Some("main"), None).expect("get").len(), 2);
    assert_eq!(db.get_projects().expect("projects"), vec!["main".to_string()]);
}

#[test]
fn test_upgraded_table_accepts_new_writes() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("legacy.db");
    legacy_database(&path);

    let db = Database::open(&path).expect("Failed to open legacy database");
    let id = db
        .insert_message("You", "fresh", &MessageFields::new().project("Work"))
        .expect("insert");

    let message = db.get_message(id).expect("get").expect("message exists");
    assert_eq!(message.project, "Work");
    assert_eq!(db.count_messages(None).expect("count"), 3);
}

#[test]
fn test_migrations_add_missing_columns_once() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("legacy.db");
    legacy_database(&path);

    let conn = Connection::open(&path).expect("open");
    let applied = run_migrations(&conn).expect("first run");
    assert_eq!(
        applied,
        vec![
            "create table projects".to_string(),
            "add column messages.category".to_string(),
            "add column messages.message_type".to_string(),
            "add column messages.project".to_string(),
            "add column messages.file_path".to_string(),
        ]
    );

    let columns = table_columns(&conn, "messages").expect("columns");
    for column in ["id", "sender", "message", "timestamp", "category", "message_type", "project", "file_path"] {
        assert!(columns.iter().any(|c| c == column), "missing column {column}");
    }

    assert!(run_migrations(&conn).expect("second run").is_empty());
}

#[test]
fn test_initialize_repeatedly_preserves_rows() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("legacy.db");
    legacy_database(&path);

    let db = Database::open(&path).expect("open");
    db.initialize().expect("initialize");
    db.initialize().expect("initialize again");

    assert_eq!(db.count_messages(None).expect("count"), 2);
    assert_eq!(db.get_projects().expect("projects"), vec!["main".to_string()]);
}

#[test]
fn test_unusual_timestamps_do_not_hide_rows() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("chat.db");

    {
        let db = Database::open(&path).expect("open");
        db.insert_message("You", "normal row", &MessageFields::new()).expect("insert");
    }
    {
        let conn = Connection::open(&path).expect("raw open");
        conn.execute_batch(
            "INSERT INTO messages (sender, message, timestamp) VALUES ('You', 'epoch row', 1700000000);
             INSERT INTO messages (sender, message, timestamp) VALUES ('You', 'garbled row', 'not a date');",
        )
        .expect("seed unusual timestamps");
    }

    let db = Database::open(&path).expect("reopen");
    let messages = db.get_messages(Some("main"), None).expect("get messages");
    assert_eq!(messages.len(), 3);
    assert!(messages[0].timestamp.is_some());
    assert_eq!(
        messages[1].timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        Some("2023-11-14 22:13:20".to_string())
    );
    assert_eq!(messages[2].timestamp, None);

    assert_eq!(db.search_messages("row", None).expect("search").len(), 3);
    assert_eq!(db.get_unprocessed_messages().expect("unprocessed").len(), 3);
}
