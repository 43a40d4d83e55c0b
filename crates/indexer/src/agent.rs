use crate::config::IndexConfig;
use crate::dirty::{DirtyTracker, FileDirtyTracker, SqliteDirtyTracker};
use crate::error::{IndexerError, Result};
use crate::extractor::Extractor;
use crate::indexer::Indexer;
use crate::provider::ChainFileListProvider;
use std::sync::Arc;
use symbol_search::{
    open_search_index, NullReferenceEnhancer, QueryClient, ReferenceEnhancer, SearchClient,
};
use symbol_store::{open_store, sqlite_path, Backend, BufferedStore};

/// Everything needed to build, update and query one index, wired from an
/// [`IndexConfig`].
pub struct IndexAgent {
    config: IndexConfig,
    indexer: Indexer,
    dirty: Arc<dyn DirtyTracker>,
}

impl IndexAgent {
    /// Validate `config` and open every backend it names.
    pub fn open(config: IndexConfig, extractor: Arc<dyn Extractor>) -> Result<Self> {
        config.validate().map_err(IndexerError::ConfigError)?;
        std::fs::create_dir_all(&config.index_root)?;

        let store = BufferedStore::with_batch_size(
            open_store(config.backend, &config.index_root)?,
            config.store_batch_size,
        );
        let search = open_search_index(
            config.backend,
            &config.index_root,
            config.search_batch_size,
        )?;
        let dirty: Arc<dyn DirtyTracker> = match config.backend {
            Backend::File => Arc::new(FileDirtyTracker::open(&config.index_root)?),
            Backend::Sqlite => Arc::new(SqliteDirtyTracker::open(&sqlite_path(
                &config.index_root,
            ))?),
        };
        let provider = ChainFileListProvider::from_config(&config, dirty.clone())?;

        let indexer = Indexer::new(
            config.index_root.clone(),
            store,
            search,
            Box::new(provider),
            dirty.clone(),
            extractor,
        );
        log::info!(
            "Opened {} index at {} for {}",
            config.backend.as_str(),
            config.index_root.display(),
            config.project_root.display()
        );

        Ok(Self {
            config,
            indexer,
            dirty,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn indexer(&mut self) -> &mut Indexer {
        &mut self.indexer
    }

    pub fn dirty_tracker(&self) -> &Arc<dyn DirtyTracker> {
        &self.dirty
    }

    /// Report a file changed outside of an indexing pass.
    pub fn mark_dirty(&self, path: &str) -> Result<()> {
        self.dirty.mark_dirty(path)
    }

    pub fn query(&self) -> QueryClient<'_> {
        QueryClient::new(self.indexer.store(), &NullReferenceEnhancer)
    }

    pub fn query_with<'a>(&'a self, enhancer: &'a dyn ReferenceEnhancer) -> QueryClient<'a> {
        QueryClient::new(self.indexer.store(), enhancer)
    }

    pub fn search(&mut self) -> SearchClient<'_> {
        self.indexer.search_client()
    }
}
