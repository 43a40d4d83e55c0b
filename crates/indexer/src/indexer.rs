use crate::dirty::DirtyTracker;
use crate::error::{IndexerError, Result};
use crate::extractor::{Extractor, TextDocument};
use crate::freshness::FreshnessTracker;
use crate::index_lock::acquire_index_write_lock;
use crate::provider::FileListProvider;
use crate::stats::IndexStats;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use symbol_record::{
    normalize_uri, uri_to_path, FileRecord, MemberRecord, Record, RecordKey, RecordType,
};
use symbol_search::{SearchClient, SearchIndex};
use symbol_store::{BufferedStore, RecordStore};

/// Record store as written by the indexer: buffered in front of a backend.
pub type IndexStore = BufferedStore<Box<dyn RecordStore>>;

/// Runs indexing passes over one record store / search index pair.
///
/// A pass owns write access to both for its whole duration and holds the
/// cross-process index lock while it runs. Both buffers flush only between
/// files, so a file's records never reach one backend without the other.
pub struct Indexer {
    index_root: PathBuf,
    store: IndexStore,
    search: Box<dyn SearchIndex>,
    provider: Box<dyn FileListProvider>,
    dirty: Arc<dyn DirtyTracker>,
    extractor: Arc<dyn Extractor>,
}

impl Indexer {
    pub fn new(
        index_root: impl Into<PathBuf>,
        store: IndexStore,
        search: Box<dyn SearchIndex>,
        provider: Box<dyn FileListProvider>,
        dirty: Arc<dyn DirtyTracker>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let mut store = store;
        let mut search = search;
        store.set_auto_flush(false);
        search.set_auto_flush(false);
        Self {
            index_root: index_root.into(),
            store,
            search,
            provider,
            dirty,
            extractor,
        }
    }

    /// Read-your-writes view of the record store.
    pub fn store(&self) -> &dyn RecordStore {
        &self.store
    }

    pub fn search_index(&mut self) -> &mut dyn SearchIndex {
        self.search.as_mut()
    }

    /// Search client resolving hits through this indexer's store.
    pub fn search_client(&mut self) -> SearchClient<'_> {
        SearchClient::new(self.search.as_mut(), &self.store)
    }

    /// Index every candidate from the provider chain. Fresh files are skipped
    /// unless `force` is set.
    pub async fn run(&mut self, force: bool) -> Result<IndexStats> {
        let start = Instant::now();
        let _lock = acquire_index_write_lock(&self.index_root).await?;
        log::info!("Updating index at {}", self.index_root.display());

        let candidates = self.provider.provide()?;
        let mut stats = self.index_candidates(candidates, force).await?;

        self.store.mark_updated(FreshnessTracker::now_secs())?;
        stats.time_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Indexed {} files ({} fresh, {} duplicates, {} errors), {} records in {}ms",
            stats.indexed,
            stats.skipped_fresh,
            stats.duplicates,
            stats.errors,
            stats.records,
            stats.time_ms
        );
        Ok(stats)
    }

    /// Index a single file now, whatever its freshness.
    pub async fn index_file(&mut self, path: &Path) -> Result<IndexStats> {
        let start = Instant::now();
        let _lock = acquire_index_write_lock(&self.index_root).await?;

        let mut stats = self
            .index_candidates(vec![path.to_path_buf()], true)
            .await?;
        stats.time_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Drop records of files that no longer exist on disk. Returns the number
    /// of records removed.
    pub async fn sweep(&mut self) -> Result<usize> {
        let _lock = acquire_index_write_lock(&self.index_root).await?;

        let removed = self.store.sweep(&mut |uri: &str| {
            !uri.starts_with("file://") || uri_to_path(uri).exists()
        })?;
        for record in &removed {
            self.search.remove(record)?;
        }
        self.search.flush()?;
        self.store.flush()?;

        log::info!("Swept {} orphaned records", removed.len());
        Ok(removed.len())
    }

    /// Clear the record store and the class entries of the search index.
    pub fn reset(&mut self) -> Result<()> {
        self.store.reset()?;
        self.search.reset()?;
        self.search.flush()?;
        log::info!("Index at {} reset", self.index_root.display());
        Ok(())
    }

    async fn index_candidates(
        &mut self,
        candidates: Vec<PathBuf>,
        force: bool,
    ) -> Result<IndexStats> {
        let mut stats = IndexStats {
            candidates: candidates.len(),
            ..IndexStats::default()
        };

        let mut seen = HashSet::new();
        let mut stale = Vec::new();
        for path in candidates {
            let uri = normalize_uri(&path.to_string_lossy());
            if !seen.insert(uri.clone()) {
                stats.duplicates += 1;
                continue;
            }

            if !force {
                match FreshnessTracker::mtime(&path).await {
                    Ok(mtime) => {
                        if FreshnessTracker::is_fresh(&self.store, &uri, mtime)? {
                            log::debug!("Skipping fresh file {}", path.display());
                            stats.skipped_fresh += 1;
                            continue;
                        }
                    }
                    Err(IndexerError::IoError(err)) if err.kind() == ErrorKind::NotFound => {
                        log::debug!("Skipping vanished file {}", path.display());
                        continue;
                    }
                    Err(err) => {
                        log::warn!("Failed to stat {}: {err}", path.display());
                        stats.errors += 1;
                        continue;
                    }
                }
            }
            stale.push((path, uri));
        }

        // Reads overlap; extraction and writes stay sequential.
        let max_concurrent = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(2, 8);

        for batch in stale.chunks(max_concurrent) {
            let mut tasks = Vec::with_capacity(batch.len());
            for (path, _) in batch {
                let path = path.clone();
                tasks.push(tokio::spawn(async move {
                    tokio::fs::read_to_string(&path).await
                }));
            }

            for ((path, uri), task) in batch.iter().zip(tasks) {
                let text = match task.await {
                    Ok(Ok(text)) => text,
                    Ok(Err(err)) => {
                        log::warn!("Failed to read {}: {err}", path.display());
                        stats.errors += 1;
                        self.dirty.mark_dirty(uri)?;
                        continue;
                    }
                    Err(err) => {
                        log::warn!("Read task for {} failed: {err}", path.display());
                        stats.errors += 1;
                        self.dirty.mark_dirty(uri)?;
                        continue;
                    }
                };

                let document = TextDocument {
                    uri: uri.clone(),
                    path: path.clone(),
                    text,
                };
                self.index_document(&document, &mut stats)?;
            }
        }

        self.store.flush()?;
        self.search.flush()?;
        Ok(stats)
    }

    fn index_document(&mut self, document: &TextDocument, stats: &mut IndexStats) -> Result<()> {
        let records = match self.extractor.extract(document) {
            Ok(records) => records,
            Err(err) => {
                log::warn!("Failed to extract {}: {err:#}", document.uri);
                stats.errors += 1;
                self.dirty.mark_dirty(&document.uri)?;
                return Ok(());
            }
        };

        stats.records += self.apply(&document.uri, records)?;
        stats.indexed += 1;
        self.dirty.clear(&document.uri)?;
        self.flush_if_full()
    }

    /// Flush both buffers once either has a full batch. Only called between
    /// files.
    fn flush_if_full(&mut self) -> Result<()> {
        if self.store.is_full() || self.search.is_full() {
            self.store.flush()?;
            self.search.flush()?;
        }
        Ok(())
    }

    /// Write one file's records, keeping member back-references in step with
    /// the file's outbound references.
    fn apply(&mut self, uri: &str, records: Vec<Record>) -> Result<usize> {
        let previous = match self.store.get(&RecordKey::file(uri))? {
            Some(Record::File(file)) => Some(file),
            _ => None,
        };

        let mut written = 0;
        let mut file = None;
        let mut members: BTreeMap<String, MemberRecord> = BTreeMap::new();
        for record in records {
            match record {
                Record::File(candidate) if candidate.path == uri => file = Some(candidate),
                Record::Member(mut member) => {
                    let identifier = member.identifier();
                    if let Some(known) = self.take_member(&mut members, &identifier)? {
                        member.references.extend(known.references);
                    }
                    members.insert(identifier, member);
                }
                other => {
                    if other.is_placeholder() && self.is_defined(&other)? {
                        log::debug!("Keeping located {} over placeholder from {uri}", other.key());
                        continue;
                    }
                    self.search.write(&other)?;
                    self.store.write(other)?;
                    written += 1;
                }
            }
        }

        let mut file = file.unwrap_or_else(|| FileRecord::from_path(uri));
        file.last_indexed = Some(FreshnessTracker::next_stamp(
            previous.as_ref().and_then(|previous| previous.last_indexed),
        ));

        let referenced = member_references(&file);
        let before = previous.as_ref().map(member_references).unwrap_or_default();
        for identifier in before.difference(&referenced) {
            if let Some(mut member) = self.take_member(&mut members, identifier)? {
                member.references.remove(uri);
                members.insert(identifier.clone(), member);
            }
        }
        for identifier in &referenced {
            let mut member = match self.take_member(&mut members, identifier)? {
                Some(member) => member,
                None => match MemberRecord::from_identifier(identifier) {
                    Ok(member) => member,
                    Err(err) => {
                        log::warn!("Ignoring member reference in {uri}: {err}");
                        continue;
                    }
                },
            };
            member.references.insert(uri.to_string());
            members.insert(identifier.clone(), member);
        }

        for member in members.into_values() {
            self.store.write(Record::Member(member))?;
            written += 1;
        }
        self.store.write(Record::File(file))?;
        Ok(written + 1)
    }

    fn is_defined(&self, record: &Record) -> Result<bool> {
        Ok(self
            .store
            .get(&record.key())?
            .is_some_and(|stored| !stored.is_placeholder()))
    }

    /// Member from this file's pending set, else from the store.
    fn take_member(
        &self,
        pending: &mut BTreeMap<String, MemberRecord>,
        identifier: &str,
    ) -> Result<Option<MemberRecord>> {
        if let Some(member) = pending.remove(identifier) {
            return Ok(Some(member));
        }
        let Ok(prototype) = MemberRecord::from_identifier(identifier) else {
            return Ok(None);
        };
        let key = RecordKey::member(prototype.member_type, &prototype.member_name);
        Ok(match self.store.get(&key)? {
            Some(Record::Member(member)) => Some(member),
            _ => None,
        })
    }
}

fn member_references(file: &FileRecord) -> BTreeSet<String> {
    file.references
        .iter()
        .filter(|reference| reference.record_type == RecordType::Member)
        .map(|reference| reference.identifier.clone())
        .collect()
}
