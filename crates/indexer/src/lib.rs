//! # Symbol Indexer
//!
//! Incremental indexing of a project's symbols into a record store and a
//! search index.
//!
//! ## Pipeline
//!
//! ```text
//! FileListProvider chain
//!     │
//!     ├──> project globs ──┐
//!     ├──> stub paths ─────┼──> candidates (deduplicated)
//!     └──> dirty log ──────┘        │
//!                                   ├──> fresh? skip
//!                                   │
//!                               Extractor (external)
//!                                   │
//!                                   └──> Records ──> RecordStore + SearchIndex
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use symbol_indexer::{Extractor, IndexAgent, IndexConfig, TextDocument};
//! use symbol_record::Record;
//!
//! struct NoopExtractor;
//!
//! impl Extractor for NoopExtractor {
//!     fn extract(&self, _document: &TextDocument) -> anyhow::Result<Vec<Record>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IndexConfig::new("/tmp/index", "/path/to/project");
//!     let mut agent = IndexAgent::open(config, Arc::new(NoopExtractor))?;
//!     let stats = agent.indexer().run(false).await?;
//!
//!     println!("Indexed {} files, {} records", stats.indexed, stats.records);
//!     Ok(())
//! }
//! ```

mod agent;
mod config;
mod dirty;
mod error;
mod extractor;
mod freshness;
mod index_lock;
mod indexer;
mod provider;
mod stats;

pub use agent::IndexAgent;
pub use config::{
    default_include_patterns, default_supported_extensions, IndexConfig,
    DEFAULT_MAX_FILE_SIZE_BYTES,
};
pub use dirty::{DirtyTracker, FileDirtyTracker, SqliteDirtyTracker, DIRTY_FILE_NAME};
pub use error::{IndexerError, Result};
pub use extractor::{Extractor, TextDocument};
pub use freshness::FreshnessTracker;
pub use index_lock::{acquire_index_write_lock, lock_path_for_root, IndexWriteLock, LOCK_FILE_NAME};
pub use indexer::{IndexStore, Indexer};
pub use provider::{
    ChainFileListProvider, DirtyFileListProvider, FileListProvider, GlobFileListProvider,
    StubFileListProvider,
};
pub use stats::IndexStats;
