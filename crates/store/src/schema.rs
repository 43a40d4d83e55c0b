//! SQLite connection setup shared by the store, the search index and the dirty log.

use rusqlite::{Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::time::Duration;

/// A table and the statements creating it (plus its indices).
pub struct Table {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Open (or create) the database at `path` with WAL journaling and foreign keys.
pub fn open_connection(path: &Path) -> SqlResult<Connection> {
    let conn = Connection::open(path)?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "on")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

pub fn table_exists(conn: &Connection, name: &str) -> SqlResult<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Create every table that does not exist yet.
pub fn ensure_tables(conn: &Connection, tables: &[Table]) -> SqlResult<()> {
    for table in tables {
        if !table_exists(conn, table.name)? {
            conn.execute_batch(table.sql)?;
        }
    }
    Ok(())
}

/// Drop `tables` (children first) and create them again.
pub fn recreate_tables(conn: &Connection, tables: &[Table]) -> SqlResult<()> {
    for table in tables.iter().rev() {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name))?;
    }
    ensure_tables(conn, tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TABLES: &[Table] = &[Table {
        name: "widgets",
        sql: "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    }];

    #[test]
    fn tables_are_created_once() {
        let dir = TempDir::new().unwrap();
        let conn = open_connection(&dir.path().join("test.sqlite")).unwrap();

        assert!(!table_exists(&conn, "widgets").unwrap());
        ensure_tables(&conn, TABLES).unwrap();
        conn.execute("INSERT INTO widgets (name) VALUES ('a')", [])
            .unwrap();
        ensure_tables(&conn, TABLES).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM widgets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn recreate_empties_tables() {
        let dir = TempDir::new().unwrap();
        let conn = open_connection(&dir.path().join("test.sqlite")).unwrap();
        ensure_tables(&conn, TABLES).unwrap();
        conn.execute("INSERT INTO widgets (name) VALUES ('a')", [])
            .unwrap();

        recreate_tables(&conn, TABLES).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM widgets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn wal_mode_enabled() {
        let dir = TempDir::new().unwrap();
        let conn = open_connection(&dir.path().join("test.sqlite")).unwrap();
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
