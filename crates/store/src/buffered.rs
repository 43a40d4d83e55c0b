use crate::error::Result;
use crate::store::RecordStore;
use std::collections::HashMap;
use symbol_record::{Record, RecordKey};

/// Writes buffered before an automatic flush.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Write-behind buffer in front of a [`RecordStore`].
///
/// Pending writes are keyed like the store (last write wins) and are visible to
/// reads through this wrapper. Call [`RecordStore::flush`] before reading the
/// inner store directly.
///
/// With auto flush turned off the buffer only flushes when asked to, and
/// [`BufferedStore::is_full`] reports when the batch size has been reached.
pub struct BufferedStore<S: RecordStore> {
    inner: S,
    buffer: HashMap<RecordKey, Record>,
    batch_size: usize,
    counter: usize,
    auto_flush: bool,
}

impl<S: RecordStore> BufferedStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_batch_size(inner, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(inner: S, batch_size: usize) -> Self {
        Self {
            inner,
            buffer: HashMap::new(),
            batch_size: batch_size.max(1),
            counter: 0,
            auto_flush: true,
        }
    }

    pub fn set_auto_flush(&mut self, enabled: bool) {
        self.auto_flush = enabled;
    }

    /// Whether a batch worth of writes arrived since the last flush.
    pub fn is_full(&self) -> bool {
        self.counter >= self.batch_size
    }

    /// Number of writes waiting for a flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: RecordStore> RecordStore for BufferedStore<S> {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        if let Some(record) = self.buffer.get(key) {
            return Ok(Some(record.clone()));
        }
        self.inner.get(key)
    }

    fn write(&mut self, record: Record) -> Result<()> {
        if record.is_speculative() {
            return Ok(());
        }

        self.buffer.insert(record.key(), record);
        self.counter += 1;
        if self.auto_flush && self.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &RecordKey) -> Result<()> {
        self.buffer.remove(key);
        self.inner.remove(key)
    }

    fn reset(&mut self) -> Result<()> {
        self.buffer.clear();
        self.counter = 0;
        self.inner.reset()
    }

    fn is_fresh(&self, path: &str, mtime: i64) -> Result<bool> {
        match self.buffer.get(&RecordKey::file(path)) {
            Some(Record::File(file)) => Ok(file.last_indexed.is_some_and(|stamp| mtime <= stamp)),
            _ => self.inner.is_fresh(path, mtime),
        }
    }

    fn last_update(&self) -> Result<i64> {
        self.inner.last_update()
    }

    fn mark_updated(&mut self, timestamp: i64) -> Result<()> {
        self.inner.mark_updated(timestamp)
    }

    fn flush(&mut self) -> Result<()> {
        self.counter = 0;
        if !self.buffer.is_empty() {
            let mut pending: Vec<(RecordKey, Record)> = self.buffer.drain().collect();
            pending.sort_by(|a, b| a.0.cmp(&b.0));
            log::debug!("Flushing {} buffered records", pending.len());
            self.inner
                .write_batch(pending.into_iter().map(|(_, record)| record).collect())?;
        }
        self.inner.flush()
    }

    fn sweep(&mut self, keep: &mut dyn FnMut(&str) -> bool) -> Result<Vec<Record>> {
        self.flush()?;
        self.inner.sweep(keep)
    }
}

impl<S: RecordStore> Drop for BufferedStore<S> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            log::warn!(
                "Dropping record buffer with {} unflushed writes",
                self.buffer.len()
            );
        }
    }
}
