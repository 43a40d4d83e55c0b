use std::path::PathBuf;
use symbol_record::Record;

/// One source file handed to the [`Extractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    /// Normalized `file://` URI of the document
    pub uri: String,
    pub path: PathBuf,
    pub text: String,
}

/// Turns a parsed document into the records it declares and references.
///
/// Implementations must be deterministic: the same document always yields
/// the same records in the same order. The document's own [`FileRecord`]
/// (with its outbound references) may be included; the indexer creates an
/// empty one otherwise.
///
/// [`FileRecord`]: symbol_record::FileRecord
pub trait Extractor: Send + Sync {
    fn extract(&self, document: &TextDocument) -> anyhow::Result<Vec<Record>>;
}
