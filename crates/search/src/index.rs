use crate::criteria::Criteria;
use crate::entry::SearchEntry;
use crate::error::Result;
use crate::file_index::FileSearchIndex;
use crate::sqlite_index::SqliteSearchIndex;
use std::path::Path;
use symbol_record::Record;
use symbol_store::{sqlite_path, Backend};

/// Pending writes before a search index flushes on its own.
pub const DEFAULT_SEARCH_BATCH_SIZE: usize = 1_000;

/// Lazily evaluated search hits. Every call to [`SearchIndex::search`] starts
/// a fresh scan.
pub type SearchResults<'a> = Box<dyn Iterator<Item = Result<SearchEntry>> + 'a>;

/// Denormalized, criteria-queryable projection of searchable records.
pub trait SearchIndex: Send {
    /// Flushes pending writes, then scans for entries matching `criteria`.
    fn search<'a>(&'a mut self, criteria: &Criteria) -> Result<SearchResults<'a>>;

    /// Buffer the projection of `record`. Unsearchable records are ignored.
    fn write(&mut self, record: &Record) -> Result<()>;

    /// Delete the entry with the same record type, identifier and class type.
    fn remove(&mut self, record: &Record) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Turn the batch-size flush inside `write` on or off. When off, the
    /// owner flushes at its own boundaries, guided by [`SearchIndex::is_full`].
    fn set_auto_flush(&mut self, enabled: bool);

    /// Whether pending writes have reached the batch size.
    fn is_full(&self) -> bool;

    /// Clear class entries only; function and constant entries survive.
    fn reset(&mut self) -> Result<()>;
}

/// Open the search index of `backend` under `index_root`.
pub fn open_search_index(
    backend: Backend,
    index_root: &Path,
    batch_size: usize,
) -> Result<Box<dyn SearchIndex>> {
    Ok(match backend {
        Backend::File => Box::new(FileSearchIndex::open(index_root, batch_size)?),
        Backend::Sqlite => Box::new(SqliteSearchIndex::open(
            &sqlite_path(index_root),
            batch_size,
        )?),
    })
}
