//! Read side of the snapshot history plus one-off rechecks, for interactive consumers.

use crate::diff::generate_diff;
use snaptrack_scanner::{Fetcher, Result, SnapshotStore};
use std::time::Duration;
use tracing::info;

pub const NOT_ENOUGH_HISTORY: &str = "No diff available (need at least 2 snapshots).";

/// Every tracked URL, sorted
pub fn list_urls(store: &dyn SnapshotStore) -> Result<Vec<String>> {
    store.distinct_urls()
}

/// Unified diff between the two newest snapshots of `url`.
///
/// With fewer than two snapshots this returns [`NOT_ENOUGH_HISTORY`] rather than an error.
pub fn diff_url(store: &dyn SnapshotStore, url: &str, with_color: bool) -> Result<String> {
    let snapshots = store.snapshots_for_url(url)?;
    let [latest, previous, ..] = snapshots.as_slice() else {
        return Ok(NOT_ENOUGH_HISTORY.to_string());
    };

    Ok(generate_diff(&previous.html_body, &latest.html_body, with_color))
}

/// Fetch `url` once and store it if its content changed. Not bound by any crawl scope or
/// depth limit.
pub async fn recheck_url(
    store: &dyn SnapshotStore,
    fetcher: &dyn Fetcher,
    url: &str,
    timeout: Duration,
) -> Result<String> {
    let capture = fetcher.fetch(url, timeout).await?;
    let stored = store.store_or_update_snapshot(url, &capture)?;

    info!(url = %url, status = capture.status_code, stored, "Rechecked");
    Ok(if stored {
        format!("Checked {} successfully: new snapshot stored.", url)
    } else {
        format!("Checked {} successfully: content unchanged.", url)
    })
}
