//! # Symbol Search
//!
//! Criteria-driven lookup over a disposable projection of searchable records,
//! plus the read-side query facade.
//!
//! ```text
//! Criteria ──translate──> backend filter (may over-match)
//!     │                        │
//!     │                  SearchIndex scan
//!     │                        │
//!     └──────matches()─────> SearchEntry ──SearchClient──> Record
//! ```

mod client;
mod criteria;
mod entry;
mod error;
mod file_index;
mod index;
mod query;
mod sqlite_index;
mod translate;

pub use client::SearchClient;
pub use criteria::Criteria;
pub use entry::SearchEntry;
pub use error::{Result, SearchError};
pub use file_index::FileSearchIndex;
pub use index::{open_search_index, SearchIndex, SearchResults, DEFAULT_SEARCH_BATCH_SIZE};
pub use query::{MemberReferences, NullReferenceEnhancer, QueryClient, ReferenceEnhancer};
pub use sqlite_index::SqliteSearchIndex;
pub use translate::{
    escape_glob, FilterTranslator, RecordTypeFilter, RecordTypeTranslator, SqlFilter,
    SqlTranslator,
};
