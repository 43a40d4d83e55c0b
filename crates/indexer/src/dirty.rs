use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use symbol_record::normalize_uri;
use symbol_store::schema::{ensure_tables, open_connection, Table};

/// Name of the file-backend dirty log under the index root.
pub const DIRTY_FILE_NAME: &str = "dirty";

/// Persistent log of files reported changed since they were last indexed.
///
/// Entries are normalized URIs. Marks are deduplicated while pending on one
/// tracker instance. [`DirtyTracker::drain`] removes exactly the entries it
/// returns; marks made while a drain is in progress survive for the next one.
pub trait DirtyTracker: Send + Sync {
    fn mark_dirty(&self, path: &str) -> Result<()>;

    /// Remove and return every logged entry, in marking order, without duplicates.
    fn drain(&self) -> Result<Vec<String>>;

    /// Forget a file that has just been indexed.
    fn clear(&self, path: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dedup(entries: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

/// Dirty log kept as an append-only text file, one URI per line.
pub struct FileDirtyTracker {
    path: PathBuf,
    pending: Mutex<HashSet<String>>,
}

impl FileDirtyTracker {
    pub fn open(index_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_root)?;
        Ok(Self {
            path: index_root.join(DIRTY_FILE_NAME),
            pending: Mutex::new(HashSet::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn draining_path(&self) -> PathBuf {
        self.path.with_extension("draining")
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

impl DirtyTracker for FileDirtyTracker {
    fn mark_dirty(&self, path: &str) -> Result<()> {
        let uri = normalize_uri(path);
        let mut pending = lock(&self.pending);
        if pending.contains(&uri) {
            return Ok(());
        }

        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(log, "{uri}")?;
        pending.insert(uri);
        Ok(())
    }

    fn drain(&self) -> Result<Vec<String>> {
        let mut pending = lock(&self.pending);
        let draining = self.draining_path();

        // A previous drain may have died between rename and removal.
        let mut entries = read_lines(&draining)?;
        match std::fs::rename(&self.path, &draining) {
            Ok(()) => entries.extend(read_lines(&draining)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        match std::fs::remove_file(&draining) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        pending.clear();
        Ok(dedup(entries))
    }

    fn clear(&self, path: &str) -> Result<()> {
        let uri = normalize_uri(path);
        let mut pending = lock(&self.pending);
        pending.remove(&uri);

        let entries = read_lines(&self.path)?;
        if !entries.contains(&uri) {
            return Ok(());
        }

        let tmp = self.path.with_extension("tmp");
        let mut content = String::new();
        for entry in entries.into_iter().filter(|entry| entry != &uri) {
            content.push_str(&entry);
            content.push('\n');
        }
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

const TABLES: &[Table] = &[Table {
    name: "dirty_file",
    sql: "
        CREATE TABLE dirty_file (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT    NOT NULL
        );
    ",
}];

/// Dirty log kept in the `dirty_file` table of the index database.
pub struct SqliteDirtyTracker {
    conn: Mutex<Connection>,
    pending: Mutex<HashSet<String>>,
}

impl SqliteDirtyTracker {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_connection(path)?;
        ensure_tables(&conn, TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            pending: Mutex::new(HashSet::new()),
        })
    }
}

impl DirtyTracker for SqliteDirtyTracker {
    fn mark_dirty(&self, path: &str) -> Result<()> {
        let uri = normalize_uri(path);
        let mut pending = lock(&self.pending);
        if pending.contains(&uri) {
            return Ok(());
        }

        lock(&self.conn).execute("INSERT INTO dirty_file (file_path) VALUES (?1)", [&uri])?;
        pending.insert(uri);
        Ok(())
    }

    fn drain(&self) -> Result<Vec<String>> {
        let mut pending = lock(&self.pending);
        let mut conn = lock(&self.conn);
        let tx = conn.transaction()?;

        let last_id = tx
            .query_row("SELECT MAX(id) FROM dirty_file", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
        let Some(last_id) = last_id else {
            return Ok(Vec::new());
        };

        let entries = {
            let mut stmt =
                tx.prepare("SELECT file_path FROM dirty_file WHERE id <= ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![last_id], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<String>>>()?
        };
        tx.execute("DELETE FROM dirty_file WHERE id <= ?1", params![last_id])?;
        tx.commit()?;

        pending.clear();
        Ok(dedup(entries))
    }

    fn clear(&self, path: &str) -> Result<()> {
        let uri = normalize_uri(path);
        lock(&self.pending).remove(&uri);
        lock(&self.conn).execute("DELETE FROM dirty_file WHERE file_path = ?1", [&uri])?;
        Ok(())
    }
}
