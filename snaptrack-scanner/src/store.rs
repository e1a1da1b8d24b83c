use crate::error::{Result, ScanError};
use crate::fetch::PageCapture;
use crate::snapshot::{NewSnapshot, Snapshot};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Append-only, content-addressed page history.
///
/// Rows are never updated or deleted. Implementations serialize their own writes, so
/// a store can be shared between concurrently running crawl units.
pub trait SnapshotStore: Send + Sync {
    /// Newest snapshot for `url`, or `ScanError::NotFound`
    fn last_snapshot(&self, url: &str) -> Result<Snapshot>;

    /// Append a row and return its id
    fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<i64>;

    /// Every snapshot for `url`, newest first
    fn snapshots_for_url(&self, url: &str) -> Result<Vec<Snapshot>>;

    /// Every URL with at least one snapshot, sorted
    fn distinct_urls(&self) -> Result<Vec<String>>;

    fn snapshot_count(&self) -> Result<usize>;

    /// Append a snapshot unless the newest stored one already has the same content hash.
    ///
    /// Returns `true` when a row was written.
    fn store_or_update_snapshot(&self, url: &str, capture: &PageCapture) -> Result<bool> {
        let snapshot = NewSnapshot::from_capture(url, capture);

        match self.last_snapshot(url) {
            Ok(last) if last.content_hash == snapshot.content_hash => return Ok(false),
            Ok(_) | Err(ScanError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.insert_snapshot(&snapshot)?;
        Ok(true)
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_snapshots<T>(&self, f: impl FnOnce(&mut Vec<Snapshot>) -> T) -> Result<T> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| ScanError::StorageError("memory store lock poisoned".to_string()))?;
        Ok(f(&mut snapshots))
    }
}

impl SnapshotStore for MemoryStore {
    fn last_snapshot(&self, url: &str) -> Result<Snapshot> {
        self.with_snapshots(|snapshots| {
            snapshots.iter().rev().find(|s| s.url == url).cloned()
        })?
        .ok_or_else(|| ScanError::NotFound(url.to_string()))
    }

    fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<i64> {
        self.with_snapshots(|snapshots| {
            let id = snapshots.len() as i64 + 1;
            snapshots.push(snapshot.clone().into_snapshot(id, Utc::now()));
            id
        })
    }

    fn snapshots_for_url(&self, url: &str) -> Result<Vec<Snapshot>> {
        self.with_snapshots(|snapshots| {
            snapshots
                .iter()
                .rev()
                .filter(|s| s.url == url)
                .cloned()
                .collect()
        })
    }

    fn distinct_urls(&self) -> Result<Vec<String>> {
        self.with_snapshots(|snapshots| {
            snapshots
                .iter()
                .map(|s| s.url.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }

    fn snapshot_count(&self) -> Result<usize> {
        self.with_snapshots(|snapshots| snapshots.len())
    }

    /// Compare and append under one lock acquisition
    fn store_or_update_snapshot(&self, url: &str, capture: &PageCapture) -> Result<bool> {
        let snapshot = NewSnapshot::from_capture(url, capture);

        self.with_snapshots(|snapshots| {
            let unchanged = snapshots
                .iter()
                .rev()
                .find(|s| s.url == url)
                .is_some_and(|last| last.content_hash == snapshot.content_hash);
            if unchanged {
                return false;
            }

            let id = snapshots.len() as i64 + 1;
            snapshots.push(snapshot.into_snapshot(id, Utc::now()));
            true
        })
    }
}
