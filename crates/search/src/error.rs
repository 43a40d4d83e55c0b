use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Store error: {0}")]
    StoreError(#[from] symbol_store::StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Corrupt search entry: {0}")]
    ParseError(#[from] symbol_record::ParseError),

    #[error("Criteria not supported by {backend}: {reason}")]
    UnsupportedCriteria {
        backend: &'static str,
        reason: String,
    },
}
