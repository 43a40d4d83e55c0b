use crate::config::{default_include_patterns, default_supported_extensions, IndexConfig};
use crate::dirty::DirtyTracker;
use crate::error::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symbol_record::uri_to_path;

/// Source of candidate files for an indexing pass.
pub trait FileListProvider: Send + Sync {
    fn provide(&self) -> Result<Vec<PathBuf>>;
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let anchored = if pattern.starts_with('/') {
            pattern.clone()
        } else {
            format!("/{pattern}")
        };
        builder.add(GlobBuilder::new(&anchored).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// Walks a directory and keeps files matching include globs, no exclude glob,
/// an allowed extension, and the size cap.
pub struct GlobFileListProvider {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    extensions: Vec<String>,
    follow_symlinks: bool,
    max_file_size_bytes: u64,
}

impl GlobFileListProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        include_patterns: &[String],
        exclude_patterns: &[String],
        supported_extensions: &[String],
    ) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            include: compile(include_patterns)?,
            exclude: compile(exclude_patterns)?,
            extensions: supported_extensions.to_vec(),
            follow_symlinks: false,
            max_file_size_bytes: crate::config::DEFAULT_MAX_FILE_SIZE_BYTES,
        })
    }

    /// Project provider configured from `config`.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Ok(Self::new(
            &config.project_root,
            &config.include_patterns,
            &config.exclude_patterns,
            &config.supported_extensions,
        )?
        .with_follow_symlinks(config.follow_symlinks)
        .with_max_file_size(config.max_file_size_bytes))
    }

    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
    }

    /// Root-relative path with a leading `/` and forward slashes.
    fn anchored(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut anchored = String::new();
        for component in relative.components() {
            anchored.push('/');
            anchored.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(anchored)
    }
}

impl FileListProvider for GlobFileListProvider {
    fn provide(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.root.exists() {
            log::warn!("Skipping missing index path {}", self.root.display());
            return Ok(files);
        }

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name(|a, b| a.cmp(b));

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
                continue;
            }

            let path = entry.path();
            if !self.has_supported_extension(path) {
                continue;
            }
            let Some(anchored) = self.anchored(path) else {
                continue;
            };
            if !self.include.is_match(&anchored) || self.exclude.is_match(&anchored) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.max_file_size_bytes {
                    log::debug!(
                        "Skipping large file {} ({} bytes > {})",
                        path.display(),
                        meta.len(),
                        self.max_file_size_bytes
                    );
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        log::debug!("Found {} candidate files under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// A stub file, or every file under a stub directory, using the default
/// patterns and extensions.
pub struct StubFileListProvider {
    path: PathBuf,
    follow_symlinks: bool,
}

impl StubFileListProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            follow_symlinks: false,
        }
    }

    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

impl FileListProvider for StubFileListProvider {
    fn provide(&self) -> Result<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        GlobFileListProvider::new(
            &self.path,
            &default_include_patterns(),
            &[],
            &default_supported_extensions(),
        )?
        .with_follow_symlinks(self.follow_symlinks)
        .provide()
    }
}

/// Drains the dirty log. Every call consumes what it returns.
pub struct DirtyFileListProvider {
    tracker: Arc<dyn DirtyTracker>,
}

impl DirtyFileListProvider {
    pub fn new(tracker: Arc<dyn DirtyTracker>) -> Self {
        Self { tracker }
    }
}

impl FileListProvider for DirtyFileListProvider {
    fn provide(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .tracker
            .drain()?
            .iter()
            .map(|uri| uri_to_path(uri))
            .collect())
    }
}

/// Concatenation of several providers, in order. Duplicates are kept.
#[derive(Default)]
pub struct ChainFileListProvider {
    providers: Vec<Box<dyn FileListProvider>>,
}

impl ChainFileListProvider {
    pub fn new(providers: Vec<Box<dyn FileListProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: Box<dyn FileListProvider>) {
        self.providers.push(provider);
    }

    /// Project globs, then every stub path, then the dirty log.
    pub fn from_config(config: &IndexConfig, dirty: Arc<dyn DirtyTracker>) -> Result<Self> {
        let mut chain = Self::default();
        chain.push(Box::new(GlobFileListProvider::from_config(config)?));
        for stub in &config.stub_paths {
            chain.push(Box::new(
                StubFileListProvider::new(stub).with_follow_symlinks(config.follow_symlinks),
            ));
        }
        chain.push(Box::new(DirtyFileListProvider::new(dirty)));
        Ok(chain)
    }
}

impl FileListProvider for ChainFileListProvider {
    fn provide(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for provider in &self.providers {
            files.extend(provider.provide()?);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirty::FileDirtyTracker;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|path| {
                path.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn glob_provider_applies_patterns_and_extensions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "a.php", "");
        touch(root, "src/B.php", "");
        touch(root, "src/readme.md", "");
        touch(root, "vendor/lib/C.php", "");
        touch(root, "tools/box.phar", "");

        let provider = GlobFileListProvider::new(
            root,
            &default_include_patterns(),
            &["vendor/**".to_string()],
            &default_supported_extensions(),
        )
        .unwrap();

        assert_eq!(
            relative(root, provider.provide().unwrap()),
            vec!["a.php", "src/B.php", "tools/box.phar"]
        );
    }

    #[test]
    fn glob_provider_skips_large_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "small.php", "<?php");
        touch(root, "large.php", &"x".repeat(64));

        let provider = GlobFileListProvider::new(
            root,
            &default_include_patterns(),
            &[],
            &default_supported_extensions(),
        )
        .unwrap()
        .with_max_file_size(16);

        assert_eq!(relative(root, provider.provide().unwrap()), vec!["small.php"]);
    }

    #[test]
    fn stub_provider_accepts_single_file() {
        let dir = TempDir::new().unwrap();
        let stub = touch(dir.path(), "stubs/core.php", "");
        assert_eq!(
            StubFileListProvider::new(&stub).provide().unwrap(),
            vec![stub]
        );
    }

    #[test]
    fn chain_preserves_order_and_duplicates() {
        let project = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let a = touch(project.path(), "a.php", "");
        let stub = touch(project.path(), "stubs/s.php", "");

        let tracker: Arc<dyn DirtyTracker> = Arc::new(FileDirtyTracker::open(index.path()).unwrap());
        tracker.mark_dirty(&a.to_string_lossy()).unwrap();

        let mut config = IndexConfig::new(index.path(), project.path());
        config.exclude_patterns = vec!["/stubs/**".to_string()];
        config.stub_paths = vec![stub.clone()];
        let chain = ChainFileListProvider::from_config(&config, tracker.clone()).unwrap();

        assert_eq!(chain.provide().unwrap(), vec![a.clone(), stub, a]);
        assert!(tracker.drain().unwrap().is_empty());
    }
}
