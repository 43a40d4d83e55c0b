//! # Symbol Store
//!
//! Key-addressed persistence for [`symbol_record::Record`]s.
//!
//! ```text
//! BufferedStore (write-behind, read-your-writes)
//!     │
//!     └──> dyn RecordStore
//!             ├──> FileRecordStore    <root>/<type>_<h0>/<h1>/<hash>.cache
//!             └──> SqliteRecordStore  one table per record variant
//! ```
//!
//! Backends are picked with [`Backend`] and opened explicitly through
//! [`open_store`].

mod buffered;
mod error;
mod file_store;
pub mod schema;
mod sqlite_store;
mod store;

pub use buffered::{BufferedStore, DEFAULT_BATCH_SIZE};
pub use error::{Result, StoreError};
pub use file_store::{FileRecordStore, SCHEMA_VERSION};
pub use sqlite_store::SqliteRecordStore;
pub use store::{
    open_store, sqlite_path, Backend, RecordStore, RECORDS_DIR_NAME, SQLITE_FILE_NAME,
};
