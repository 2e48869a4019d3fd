//! Database Connection and Setup
//!
//! Opens the embedded SQLite database and runs migrations.
//! Also describes the column layout of each table so rows can be
//! converted between JSON and SQL values.

use rusqlite::Connection;
use std::path::Path;

use crate::domain::{DomainError, DomainResult, Table};

/// How a column's JSON value is stored in SQLite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Text,
    Integer,
    /// Stored as 0/1
    Bool,
    /// Arbitrary JSON stored as text
    Json,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

const BOARD_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("title", ColumnKind::Text),
    col("user_id", ColumnKind::Text),
    col("favorite", ColumnKind::Bool),
    col("created_at", ColumnKind::Text),
];

const LIST_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("title", ColumnKind::Text),
    col("board_id", ColumnKind::Text),
    col("position", ColumnKind::Integer),
];

const CARD_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("title", ColumnKind::Text),
    col("list_id", ColumnKind::Text),
    col("position", ColumnKind::Integer),
    col("description", ColumnKind::Text),
    col("attachments", ColumnKind::Json),
];

const COMMENT_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("card_id", ColumnKind::Text),
    col("user_id", ColumnKind::Text),
    col("text", ColumnKind::Text),
    col("created_at", ColumnKind::Text),
];

/// Columns of a table in select order
pub(crate) fn columns(table: Table) -> &'static [Column] {
    match table {
        Table::Boards => BOARD_COLUMNS,
        Table::Lists => LIST_COLUMNS,
        Table::Cards => CARD_COLUMNS,
        Table::Comments => COMMENT_COLUMNS,
    }
}

/// Look up a column, rejecting names outside the schema
pub(crate) fn column(table: Table, name: &str) -> DomainResult<Column> {
    columns(table)
        .iter()
        .copied()
        .find(|c| c.name == name)
        .ok_or_else(|| DomainError::InvalidInput(format!("Unknown column {}.{}", table, name)))
}

/// Open (or create) a database file and migrate it
pub fn init_db(db_path: &Path) -> DomainResult<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DomainError::Internal(format!("Failed to create db dir: {}", e)))?;
        }
    }
    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Backend(format!("Failed to open db: {}", e)))?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Fresh in-memory database, used by tests and throwaway sessions
pub fn init_memory_db() -> DomainResult<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| DomainError::Backend(format!("Failed to open db: {}", e)))?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(|e| DomainError::Backend(e.to_string()))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| DomainError::Backend(e.to_string()))?;
    for name in names {
        if name.map_err(|e| DomainError::Backend(e.to_string()))? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, ddl: &str) -> DomainResult<()> {
    if !column_exists(conn, table, column)? {
        conn.execute(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, ddl), [])
            .map_err(|e| DomainError::Backend(format!("Failed to add {}.{}: {}", table, column, e)))?;
    }
    Ok(())
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS boards (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lists (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )
    .map_err(|e| DomainError::Backend(format!("Migration failed: {}", e)))?;

    // Columns added after the first release
    add_column_if_missing(conn, "boards", "favorite", "INTEGER")?;
    add_column_if_missing(conn, "cards", "description", "TEXT")?;
    add_column_if_missing(conn, "cards", "attachments", "TEXT")?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_boards_user ON boards(user_id);
        CREATE INDEX IF NOT EXISTS idx_lists_board ON lists(board_id);
        CREATE INDEX IF NOT EXISTS idx_cards_list ON cards(list_id);
        CREATE INDEX IF NOT EXISTS idx_comments_card ON comments(card_id);",
    )
    .map_err(|e| DomainError::Backend(format!("Migration failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = init_memory_db().unwrap();
        run_migrations(&conn).expect("second run");
        assert!(column_exists(&conn, "boards", "favorite").unwrap());
        assert!(column_exists(&conn, "cards", "attachments").unwrap());
        assert!(!column_exists(&conn, "lists", "favorite").unwrap());
    }

    #[test]
    fn test_schema_matches_column_table() {
        let conn = init_memory_db().unwrap();
        for table in [Table::Boards, Table::Lists, Table::Cards, Table::Comments] {
            for c in columns(table) {
                assert!(column_exists(&conn, table.as_str(), c.name).unwrap(), "{}.{}", table, c.name);
            }
        }
    }

    #[test]
    fn test_unknown_column_rejected() {
        assert!(column(Table::Lists, "position").is_ok());
        assert!(matches!(column(Table::Lists, "drop table"), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_file_db_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kanban.db");
        init_db(&path).unwrap();
        assert!(path.exists());
    }
}
