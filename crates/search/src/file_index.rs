use crate::criteria::Criteria;
use crate::entry::SearchEntry;
use crate::error::Result;
use crate::index::{SearchIndex, SearchResults};
use crate::translate::{FilterTranslator, RecordTypeTranslator};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use symbol_record::{Record, RecordKey, RecordType};

const SEARCH_FILE_NAME: &str = "search.jsonl";

/// Search index kept in memory and persisted as JSON lines.
pub struct FileSearchIndex {
    path: PathBuf,
    entries: BTreeMap<RecordKey, SearchEntry>,
    pending: Vec<Pending>,
    batch_size: usize,
    auto_flush: bool,
}

enum Pending {
    Write(SearchEntry),
    Remove(SearchEntry),
}

impl FileSearchIndex {
    pub fn open(index_root: &Path, batch_size: usize) -> Result<Self> {
        std::fs::create_dir_all(index_root)?;
        let path = index_root.join(SEARCH_FILE_NAME);
        let entries = load_entries(&path)?;
        Ok(Self {
            path,
            entries,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            auto_flush: true,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        let mut out = std::io::BufWriter::new(std::fs::File::create(&tmp)?);
        for entry in self.entries.values() {
            serde_json::to_writer(&mut out, entry)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        drop(out);
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<RecordKey, SearchEntry>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    };

    let mut entries = BTreeMap::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SearchEntry>(&line) {
            Ok(entry) => {
                entries.insert(entry.key(), entry);
            }
            Err(err) => {
                log::warn!(
                    "Skipping corrupt search entry {}:{}: {err}",
                    path.display(),
                    number + 1
                );
            }
        }
    }
    Ok(entries)
}

impl SearchIndex for FileSearchIndex {
    fn search<'a>(&'a mut self, criteria: &Criteria) -> Result<SearchResults<'a>> {
        let filter = RecordTypeTranslator.translate(criteria)?;
        self.flush()?;

        let criteria = criteria.clone();
        Ok(Box::new(
            self.entries
                .values()
                .filter(move |entry| filter.admits(entry) && criteria.matches(entry))
                .cloned()
                .map(Ok),
        ))
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        let Some(entry) = SearchEntry::from_record(record) else {
            return Ok(());
        };
        self.pending.push(Pending::Write(entry));
        if self.auto_flush && self.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    fn set_auto_flush(&mut self, enabled: bool) {
        self.auto_flush = enabled;
    }

    fn is_full(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    fn remove(&mut self, record: &Record) -> Result<()> {
        let class_type = match record {
            Record::Class(class) => class.class_type,
            _ => None,
        };
        self.pending.push(Pending::Remove(SearchEntry {
            record_type: record.record_type(),
            identifier: record.identifier(),
            class_type,
            flags: 0,
        }));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        for pending in std::mem::take(&mut self.pending) {
            match pending {
                Pending::Write(entry) => {
                    self.entries.insert(entry.key(), entry);
                }
                Pending::Remove(target) => {
                    let key = target.key();
                    if self
                        .entries
                        .get(&key)
                        .is_some_and(|entry| entry.class_type == target.class_type)
                    {
                        self.entries.remove(&key);
                    }
                }
            }
        }
        self.persist()
    }

    fn reset(&mut self) -> Result<()> {
        self.flush()?;
        self.entries
            .retain(|_, entry| entry.record_type != RecordType::Class);
        self.persist()
    }
}
