use crate::{IndexerError, Result};
use fs2::FileExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const LOCK_FILE_NAME: &str = "index.lock";

/// Exclusive write access to one index root, released on drop.
pub struct IndexWriteLock {
    file: std::fs::File,
    path: PathBuf,
}

impl IndexWriteLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_path_for_root(index_root: &Path) -> PathBuf {
    index_root.join(LOCK_FILE_NAME)
}

/// Blocks (off the async runtime) until no other process writes to `index_root`.
pub async fn acquire_index_write_lock(index_root: &Path) -> Result<IndexWriteLock> {
    let path = lock_path_for_root(index_root);
    tokio::fs::create_dir_all(index_root).await?;

    let lock = tokio::task::spawn_blocking(move || -> Result<IndexWriteLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Other(format!("open index lock {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            IndexerError::Other(format!("acquire index lock {}: {err}", path.display()))
        })?;
        log::debug!(
            "Acquired index lock {} after {}ms",
            path.display(),
            start.elapsed().as_millis()
        );

        Ok(IndexWriteLock { file, path })
    })
    .await
    .map_err(|err| IndexerError::Other(format!("join index lock task: {err}")))??;

    Ok(lock)
}
