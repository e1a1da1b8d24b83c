use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),

    #[error("Invalid crawl configuration: {0}")]
    InvalidConfig(String),

    /// Building the HTTP client or request failed, before anything was sent
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Per-page transport failure or timeout
    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("No snapshot found for {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
