use crate::error::Result;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use symbol_store::RecordStore;

/// Per-file timestamp bookkeeping against the record store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessTracker;

impl FreshnessTracker {
    /// Wall clock in unix seconds, the resolution of the build timestamp.
    pub fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as i64)
    }

    /// Wall clock in unix milliseconds, the resolution of per-file stamps.
    pub fn now_millis() -> i64 {
        Self::millis_since_epoch(SystemTime::now())
    }

    /// Stamp for a file being reindexed: never behind the wall clock and
    /// always past the previous stamp. Milliseconds, like [`Self::mtime`].
    pub fn next_stamp(previous: Option<i64>) -> i64 {
        let now = Self::now_millis();
        match previous {
            Some(previous) => now.max(previous + 1),
            None => now,
        }
    }

    /// Modification time of `path` in unix milliseconds.
    pub async fn mtime(path: &Path) -> Result<i64> {
        let modified = tokio::fs::metadata(path).await?.modified()?;
        Ok(Self::millis_since_epoch(modified))
    }

    /// Whether the stored state of `uri` is at least as new as `mtime`.
    pub fn is_fresh(store: &dyn RecordStore, uri: &str, mtime: i64) -> Result<bool> {
        Ok(store.is_fresh(uri, mtime)?)
    }

    fn millis_since_epoch(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbol_record::{FileRecord, Record};
    use symbol_store::FileRecordStore;
    use tempfile::TempDir;

    #[test]
    fn stamps_strictly_increase() {
        let first = FreshnessTracker::next_stamp(None);
        let second = FreshnessTracker::next_stamp(Some(first));
        let third = FreshnessTracker::next_stamp(Some(second));
        assert!(first < second && second < third);
        assert!(FreshnessTracker::next_stamp(Some(first - 100)) >= first);
    }

    #[test]
    fn burst_of_stamps_stays_near_the_clock() {
        let mut stamp = FreshnessTracker::next_stamp(None);
        for _ in 0..50 {
            stamp = FreshnessTracker::next_stamp(Some(stamp));
        }
        assert!(stamp < FreshnessTracker::now_millis() + 1_000);
    }

    #[test]
    fn freshness_follows_stored_stamp() {
        let dir = TempDir::new().unwrap();
        let mut store = FileRecordStore::open(dir.path()).unwrap();
        store
            .write(Record::from(
                FileRecord::from_path("/src/a.php").with_last_indexed(1_000),
            ))
            .unwrap();

        assert!(FreshnessTracker::is_fresh(&store, "/src/a.php", 999).unwrap());
        assert!(FreshnessTracker::is_fresh(&store, "/src/a.php", 1_000).unwrap());
        assert!(!FreshnessTracker::is_fresh(&store, "/src/a.php", 1_001).unwrap());
        assert!(!FreshnessTracker::is_fresh(&store, "/src/b.php", 0).unwrap());
    }

    #[tokio::test]
    async fn mtime_is_recent_for_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.php");
        std::fs::write(&path, "<?php").unwrap();
        let mtime = FreshnessTracker::mtime(&path).await.unwrap();
        assert!((FreshnessTracker::now_millis() - mtime).abs() < 60_000);
    }
}
