use snaptrack_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Header serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

impl From<DataError> for ScanError {
    fn from(e: DataError) -> Self {
        ScanError::StorageError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
