use serde::{Deserialize, Serialize};

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Paths produced by the file list providers, duplicates included
    pub candidates: usize,

    /// Files handed to the extractor and written
    pub indexed: usize,

    /// Files skipped because their stored state was fresh
    pub skipped_fresh: usize,

    /// Repeated paths ignored after their first occurrence
    pub duplicates: usize,

    /// Records written, file records included
    pub records: usize,

    /// Files that could not be read or extracted
    pub errors: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,
}
