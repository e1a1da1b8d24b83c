use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use snaptrack_scanner::{
    HeaderMap, NewSnapshot, PageCapture, ScanError, Snapshot, SnapshotStore,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SNAPSHOT_COLUMNS: &str =
    "id, url, hash, html, status_code, request_headers, response_headers, created_at";

/// SQLite-backed snapshot history.
///
/// The connection sits behind a mutex so one `Database` can be shared by every crawl unit;
/// SQLite then serializes the writes.
pub struct Database {
    conn: Mutex<Connection>,
}

fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DataError::Poisoned)
    }

    pub fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<i64> {
        insert_snapshot(&*self.connection()?, snapshot)
    }

    pub fn get_last_snapshot(&self, url: &str) -> Result<Option<Snapshot>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE url = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            SNAPSHOT_COLUMNS
        ))?;

        let snapshot = stmt
            .query_row(params![url], snapshot_from_row)
            .optional()?;
        Ok(snapshot)
    }

    /// Full history of `url`, newest first
    pub fn get_snapshots_for_url(&self, url: &str) -> Result<Vec<Snapshot>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE url = ?1 ORDER BY created_at DESC, id DESC",
            SNAPSHOT_COLUMNS
        ))?;

        let snapshots = stmt
            .query_map(params![url], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    pub fn get_distinct_urls(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT DISTINCT url FROM snapshots ORDER BY url")?;

        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(urls)
    }

    pub fn count_snapshots(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_snapshots_for_url(&self, url: &str) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Append-only page history
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            hash TEXT NOT NULL,
            html TEXT NOT NULL,
            status_code INTEGER NOT NULL,
            request_headers TEXT NOT NULL DEFAULT '{}',   -- JSON object of name -> [values]
            response_headers TEXT NOT NULL DEFAULT '{}',  -- JSON object of name -> [values]
            created_at INTEGER NOT NULL                   -- Unix milliseconds
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_url_created ON snapshots(url, created_at);
        ",
    )?;
    Ok(())
}

fn insert_snapshot(conn: &Connection, snapshot: &NewSnapshot) -> Result<i64> {
    let request_headers = serde_json::to_string(&snapshot.request_headers)?;
    let response_headers = serde_json::to_string(&snapshot.response_headers)?;

    conn.execute(
        "INSERT INTO snapshots (
            url, hash, html, status_code, request_headers, response_headers, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &snapshot.url,
            &snapshot.content_hash,
            &snapshot.html_body,
            snapshot.status_code,
            request_headers,
            response_headers,
            current_timestamp_millis(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn last_hash(conn: &Connection, url: &str) -> Result<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT hash FROM snapshots WHERE url = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![url],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    let request_headers: String = row.get(5)?;
    let response_headers: String = row.get(6)?;
    let created_at: i64 = row.get(7)?;

    Ok(Snapshot {
        id: row.get(0)?,
        url: row.get(1)?,
        content_hash: row.get(2)?,
        html_body: row.get(3)?,
        status_code: row.get(4)?,
        request_headers: decode_headers(5, &request_headers)?,
        response_headers: decode_headers(6, &response_headers)?,
        created_at: decode_timestamp(7, created_at)?,
    })
}

fn decode_headers(idx: usize, raw: &str) -> rusqlite::Result<HeaderMap> {
    if raw.is_empty() {
        return Ok(HeaderMap::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn decode_timestamp(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

impl SnapshotStore for Database {
    fn last_snapshot(&self, url: &str) -> snaptrack_scanner::Result<Snapshot> {
        self.get_last_snapshot(url)?
            .ok_or_else(|| ScanError::NotFound(url.to_string()))
    }

    fn insert_snapshot(&self, snapshot: &NewSnapshot) -> snaptrack_scanner::Result<i64> {
        Ok(Database::insert_snapshot(self, snapshot)?)
    }

    fn snapshots_for_url(&self, url: &str) -> snaptrack_scanner::Result<Vec<Snapshot>> {
        Ok(self.get_snapshots_for_url(url)?)
    }

    fn distinct_urls(&self) -> snaptrack_scanner::Result<Vec<String>> {
        Ok(self.get_distinct_urls()?)
    }

    fn snapshot_count(&self) -> snaptrack_scanner::Result<usize> {
        Ok(self.count_snapshots()?)
    }

    /// Compare-and-insert under one connection lock, so a recheck racing a crawl of the
    /// same URL cannot append the same content twice.
    fn store_or_update_snapshot(
        &self,
        url: &str,
        capture: &PageCapture,
    ) -> snaptrack_scanner::Result<bool> {
        let snapshot = NewSnapshot::from_capture(url, capture);
        let conn = self.connection()?;

        if last_hash(&conn, url)?.as_deref() == Some(snapshot.content_hash.as_str()) {
            return Ok(false);
        }

        insert_snapshot(&conn, &snapshot)?;
        Ok(true)
    }
}
