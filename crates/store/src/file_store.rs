use crate::error::Result;
use crate::store::RecordStore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use symbol_record::{Record, RecordKey};
use walkdir::WalkDir;

/// Encoding version of the cache payloads. Bumping it orphans every older entry.
pub const SCHEMA_VERSION: u32 = 1;

const CACHE_EXTENSION: &str = "cache";

/// Record store keeping one serialized file per record.
///
/// Layout: `<root>/<record_type>_<h0>/<h1>/<hash>.cache` where `hash` is the
/// hex SHA-256 of the record identifier, plus `<root>/timestamp.v<N>`.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, key: &RecordKey) -> PathBuf {
        let hash = sha256_hex(key.identifier().as_bytes());
        let (shard_a, shard_b) = shard_dirs(&hash);
        self.root
            .join(format!("{}_{shard_a}", key.record_type().as_str()))
            .join(shard_b)
            .join(format!("{hash}.{CACHE_EXTENSION}"))
    }

    fn timestamp_path(&self) -> PathBuf {
        self.root.join(format!("timestamp.v{SCHEMA_VERSION}"))
    }

    fn read_entry(&self, path: &Path) -> Option<Record> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!("Failed to read index entry {}: {err}", path.display());
                return None;
            }
        };

        match serde_json::from_slice::<Record>(&bytes) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("Corrupt index entry {}: {err}", path.display());
                discard(path);
                None
            }
        }
    }

    fn write_entry(&self, record: &Record) -> std::io::Result<()> {
        let path = self.record_path(&record.key());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(record)?;
        let tmp = path.with_extension("cache.tmp");
        std::fs::write(&tmp, bytes)?;
        if let Err(err) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
        Ok(())
    }

    fn cache_files(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path.extension()
                    .is_some_and(|extension| extension == CACHE_EXTENSION)
            })
    }
}

impl RecordStore for FileRecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        let path = self.record_path(key);
        let Some(record) = self.read_entry(&path) else {
            return Ok(None);
        };

        if record.key() != *key {
            log::warn!(
                "Index entry {} holds {} instead of {key}",
                path.display(),
                record.key()
            );
            discard(&path);
            return Ok(None);
        }

        Ok(Some(record))
    }

    fn write(&mut self, record: Record) -> Result<()> {
        if record.is_speculative() {
            log::debug!("Skipping unresolved class {}", record.identifier());
            return Ok(());
        }

        if let Err(err) = self.write_entry(&record) {
            log::warn!("Failed to write index entry for {}: {err}", record.key());
        }
        Ok(())
    }

    fn remove(&mut self, key: &RecordKey) -> Result<()> {
        discard(&self.record_path(key));
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        std::fs::create_dir_all(&self.root)?;
        log::info!("Reset file index at {}", self.root.display());
        Ok(())
    }

    fn last_update(&self) -> Result<i64> {
        let path = self.timestamp_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                log::warn!("Failed to read {}: {err}", path.display());
                return Ok(0);
            }
        };

        Ok(raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring malformed timestamp in {}", path.display());
            0
        }))
    }

    fn mark_updated(&mut self, timestamp: i64) -> Result<()> {
        let path = self.timestamp_path();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, timestamp.to_string())?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn sweep(&mut self, keep: &mut dyn FnMut(&str) -> bool) -> Result<Vec<Record>> {
        let mut verdicts: HashMap<String, bool> = HashMap::new();
        let mut removed = Vec::new();

        for path in self.cache_files().collect::<Vec<_>>() {
            let Some(record) = self.read_entry(&path) else {
                continue;
            };
            let uri = match &record {
                Record::File(file) => Some(file.path.as_str()),
                other => other.location().map(|location| location.uri.as_str()),
            };
            let Some(uri) = uri else {
                continue;
            };

            let keep_it = match verdicts.get(uri) {
                Some(verdict) => *verdict,
                None => {
                    let verdict = keep(uri);
                    verdicts.insert(uri.to_string(), verdict);
                    verdict
                }
            };
            if !keep_it {
                discard(&path);
                removed.push(record);
            }
        }

        Ok(removed)
    }
}

fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => log::warn!("Failed to remove index entry {}: {err}", path.display()),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn shard_dirs(hex: &str) -> (&str, &str) {
    (hex.get(0..1).unwrap_or("0"), hex.get(1..2).unwrap_or("0"))
}
