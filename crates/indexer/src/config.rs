use crate::error::{IndexerError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use symbol_search::DEFAULT_SEARCH_BATCH_SIZE;
use symbol_store::{Backend, DEFAULT_BATCH_SIZE};

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1_048_576;

/// Everything needed to open an index. Loaded from TOML or built in code,
/// then handed to [`crate::IndexAgent::open`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Directory holding all index state
    pub index_root: PathBuf,

    /// Root of the indexed project
    pub project_root: PathBuf,

    pub backend: Backend,

    /// Root-relative globs; the leading `/` is optional
    pub include_patterns: Vec<String>,

    /// Root-relative globs; exclusion wins over inclusion
    pub exclude_patterns: Vec<String>,

    pub supported_extensions: Vec<String>,

    /// Extra files or directories indexed with the default patterns
    pub stub_paths: Vec<PathBuf>,

    pub follow_symlinks: bool,

    pub max_file_size_bytes: u64,

    /// Record writes buffered before the store flushes on its own
    pub store_batch_size: usize,

    /// Search entries buffered before the search index flushes on its own
    pub search_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_root: PathBuf::new(),
            project_root: PathBuf::new(),
            backend: Backend::default(),
            include_patterns: default_include_patterns(),
            exclude_patterns: Vec::new(),
            supported_extensions: default_supported_extensions(),
            stub_paths: Vec::new(),
            follow_symlinks: false,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            store_batch_size: DEFAULT_BATCH_SIZE,
            search_batch_size: DEFAULT_SEARCH_BATCH_SIZE,
        }
    }
}

pub fn default_include_patterns() -> Vec<String> {
    vec!["/**/*.php".to_string(), "/**/*.phar".to_string()]
}

pub fn default_supported_extensions() -> Vec<String> {
    vec!["php".to_string(), "phar".to_string()]
}

impl IndexConfig {
    pub fn new(index_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            index_root: index_root.into(),
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate().map_err(IndexerError::ConfigError)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.index_root.as_os_str().is_empty() {
            return Err("index_root is required".to_string());
        }
        if self.project_root.as_os_str().is_empty() {
            return Err("project_root is required".to_string());
        }
        // Candidate URIs are derived from these paths.
        if !self.project_root.is_absolute() {
            return Err(format!(
                "project_root must be absolute, got {}",
                self.project_root.display()
            ));
        }
        if let Some(stub) = self.stub_paths.iter().find(|stub| !stub.is_absolute()) {
            return Err(format!("stub_paths must be absolute, got {}", stub.display()));
        }
        if self.include_patterns.is_empty() {
            return Err("include_patterns must not be empty".to_string());
        }
        if self.supported_extensions.iter().any(|ext| ext.is_empty() || ext.starts_with('.')) {
            return Err("supported_extensions must be bare extensions such as \"php\"".to_string());
        }
        if self.max_file_size_bytes == 0 {
            return Err("max_file_size_bytes must be > 0".to_string());
        }
        if self.store_batch_size == 0 || self.search_batch_size == 0 {
            return Err("batch sizes must be > 0".to_string());
        }
        Ok(())
    }
}
