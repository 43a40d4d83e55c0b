use crate::error::Result;
use crate::file_store::FileRecordStore;
use crate::sqlite_store::SqliteRecordStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use symbol_record::{Record, RecordKey};

/// File name of the SQLite database shared by every SQLite-backed component.
pub const SQLITE_FILE_NAME: &str = "index.sqlite";

/// Directory (under the index root) holding the file backend's records.
pub const RECORDS_DIR_NAME: &str = "records";

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Content-addressed serialized files
    #[default]
    File,
    /// Relational tables in a single SQLite database
    Sqlite,
}

impl Backend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }
}

#[must_use]
pub fn sqlite_path(index_root: &Path) -> PathBuf {
    index_root.join(SQLITE_FILE_NAME)
}

/// Key-addressed persistence of [`Record`]s.
///
/// Both backends are interchangeable: every method has the same observable
/// behavior regardless of the storage underneath.
pub trait RecordStore: Send {
    /// Look a record up by key. Unreadable or corrupt entries read as `None`.
    fn get(&self, key: &RecordKey) -> Result<Option<Record>>;

    fn has(&self, key: &RecordKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Upsert by key. Speculative class records (unresolved type) are skipped.
    fn write(&mut self, record: Record) -> Result<()>;

    fn write_batch(&mut self, records: Vec<Record>) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &RecordKey) -> Result<()>;

    /// Drop every record and the recorded build time.
    fn reset(&mut self) -> Result<()>;

    /// Whether the file at `path` was indexed at or after `mtime` (unix milliseconds).
    fn is_fresh(&self, path: &str, mtime: i64) -> Result<bool> {
        match self.get(&RecordKey::file(path))? {
            Some(Record::File(file)) => Ok(file.last_indexed.is_some_and(|stamp| mtime <= stamp)),
            _ => Ok(false),
        }
    }

    /// Unix seconds of the last completed build, `0` if none.
    fn last_update(&self) -> Result<i64>;

    fn mark_updated(&mut self, timestamp: i64) -> Result<()>;

    fn exists(&self) -> Result<bool> {
        Ok(self.last_update()? > 0)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Remove file records, and definitions located in files, whose URI fails
    /// `keep`. Returns the removed records.
    fn sweep(&mut self, keep: &mut dyn FnMut(&str) -> bool) -> Result<Vec<Record>>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        (**self).get(key)
    }

    fn has(&self, key: &RecordKey) -> Result<bool> {
        (**self).has(key)
    }

    fn write(&mut self, record: Record) -> Result<()> {
        (**self).write(record)
    }

    fn write_batch(&mut self, records: Vec<Record>) -> Result<()> {
        (**self).write_batch(records)
    }

    fn remove(&mut self, key: &RecordKey) -> Result<()> {
        (**self).remove(key)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn is_fresh(&self, path: &str, mtime: i64) -> Result<bool> {
        (**self).is_fresh(path, mtime)
    }

    fn last_update(&self) -> Result<i64> {
        (**self).last_update()
    }

    fn mark_updated(&mut self, timestamp: i64) -> Result<()> {
        (**self).mark_updated(timestamp)
    }

    fn exists(&self) -> Result<bool> {
        (**self).exists()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn sweep(&mut self, keep: &mut dyn FnMut(&str) -> bool) -> Result<Vec<Record>> {
        (**self).sweep(keep)
    }
}

/// Open the record store of `backend` under `index_root`.
pub fn open_store(backend: Backend, index_root: &Path) -> Result<Box<dyn RecordStore>> {
    Ok(match backend {
        Backend::File => Box::new(FileRecordStore::open(index_root.join(RECORDS_DIR_NAME))?),
        Backend::Sqlite => Box::new(SqliteRecordStore::open(&sqlite_path(index_root))?),
    })
}
