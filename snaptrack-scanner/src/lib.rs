pub mod crawler;
pub mod error;
pub mod fetch;
pub mod links;
pub mod snapshot;
pub mod store;

pub use crawler::{CrawlConfig, CrawlStats, CrawlTarget, Crawler, ProgressCallback};
pub use error::{Result, ScanError};
pub use fetch::{Fetcher, HttpFetcher, PageCapture};
pub use snapshot::{HeaderMap, NewSnapshot, Snapshot, content_hash};
pub use store::{MemoryStore, SnapshotStore};
