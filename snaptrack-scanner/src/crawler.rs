use crate::error::{Result, ScanError};
use crate::fetch::Fetcher;
use crate::links::{extract_links, normalize_url};
use crate::store::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Called with `(url, depth)` right before an admitted fetch starts
pub type ProgressCallback = Arc<dyn Fn(String, usize) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlConfig {
    pub max_depth: usize,
    /// Size of the admission gate: how many fetches may run at once
    pub concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// A unit of pending work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    pub depth: usize,
}

/// Counters collected over one crawl run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// URLs marked visited and handed to a unit, the seed included
    pub scheduled: usize,
    pub fetched: usize,
    pub failed: usize,
    /// Snapshots appended because the content changed or was new
    pub stored: usize,
    /// Fetches whose content matched the newest stored snapshot
    pub unchanged: usize,
    pub storage_errors: usize,
    /// Units dropped for exceeding the depth limit
    pub skipped_depth: usize,
}

/// URLs already scheduled during one crawl run
#[derive(Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically test-and-mark `url`. Returns `true` only for the caller that marked it.
    pub async fn mark(&self, url: &str) -> bool {
        let mut urls = self.urls.lock().await;
        if urls.contains(url) {
            false
        } else {
            urls.insert(url.to_string())
        }
    }

    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.urls.lock().await.is_empty()
    }
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicUsize,
    fetched: AtomicUsize,
    failed: AtomicUsize,
    stored: AtomicUsize,
    unchanged: AtomicUsize,
    storage_errors: AtomicUsize,
    skipped_depth: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            skipped_depth: self.skipped_depth.load(Ordering::Relaxed),
        }
    }
}

/// State shared by every unit of one crawl run
struct CrawlContext {
    scope: Url,
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn SnapshotStore>,
    gate: Semaphore,
    visited: VisitedSet,
    counters: Counters,
    progress_callback: Option<ProgressCallback>,
}

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn SnapshotStore>,
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            fetcher,
            store,
            config: CrawlConfig::default(),
            progress_callback: None,
        }
    }

    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> CrawlConfig {
        self.config
    }

    /// Crawl every same-origin page reachable from `seed_url` within the depth limit.
    ///
    /// Each scheduled URL runs as its own task; only the fetch itself holds an admission
    /// gate permit. Per-page failures are logged and never fail the run, so `Ok` means the
    /// traversal completed, not that every page was captured.
    ///
    /// Live tasks never outnumber the distinct in-scope URLs discovered. There is no
    /// overall deadline; only individual fetches are time-bounded.
    pub async fn crawl(&self, seed_url: &str) -> Result<CrawlStats> {
        let seed = parse_seed(seed_url)?;
        if self.config.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        info!(
            "Starting crawl of {} (max depth {}, concurrency {})",
            seed, self.config.max_depth, self.config.concurrency
        );
        let started = Instant::now();

        let ctx = Arc::new(CrawlContext {
            scope: seed.clone(),
            config: self.config,
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            gate: Semaphore::new(self.config.concurrency),
            visited: VisitedSet::new(),
            counters: Counters::default(),
            progress_callback: self.progress_callback.clone(),
        });

        let mut units = JoinSet::new();

        let seed_target = CrawlTarget {
            url: seed.to_string(),
            depth: 0,
        };
        ctx.visited.mark(&seed_target.url).await;
        Counters::bump(&ctx.counters.scheduled);
        units.spawn(crawl_unit(ctx.clone(), seed_target));

        // Completion is the join of every spawned unit, children included
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(children) => {
                    for child in children {
                        units.spawn(crawl_unit(ctx.clone(), child));
                    }
                }
                Err(e) => warn!("Crawl unit aborted: {}", e),
            }
        }

        let stats = ctx.counters.snapshot();
        info!(
            "Crawl complete in {:?}. Fetched {} pages, {} failed, {} new snapshots",
            started.elapsed(),
            stats.fetched,
            stats.failed,
            stats.stored
        );
        Ok(stats)
    }
}

fn parse_seed(seed_url: &str) -> Result<Url> {
    let mut seed = Url::parse(seed_url)
        .map_err(|e| ScanError::InvalidSeed(format!("{}: {}", seed_url, e)))?;

    if seed.host_str().is_none_or(str::is_empty) {
        return Err(ScanError::InvalidSeed(format!(
            "{}: URL must include a scheme and host",
            seed_url
        )));
    }

    seed.set_fragment(None);
    Ok(seed)
}

/// Fetch, store and expand one page. Returns the newly marked children to schedule.
async fn crawl_unit(ctx: Arc<CrawlContext>, target: CrawlTarget) -> Vec<CrawlTarget> {
    let CrawlTarget { url, depth } = target;

    if depth > ctx.config.max_depth {
        debug!("Skipping {} at depth {} (limit {})", url, depth, ctx.config.max_depth);
        Counters::bump(&ctx.counters.skipped_depth);
        return Vec::new();
    }

    let started = Instant::now();
    let fetched = {
        let _permit = match ctx.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(url = %url, depth, "Admission gate closed: {}", e);
                return Vec::new();
            }
        };

        if let Some(ref callback) = ctx.progress_callback {
            callback(url.clone(), depth);
        }

        let timeout = ctx.config.fetch_timeout;
        match tokio::time::timeout(timeout, ctx.fetcher.fetch(&url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::FetchError(format!(
                "{} timed out after {:?}",
                url, timeout
            ))),
        }
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let capture = match fetched {
        Ok(capture) => capture,
        Err(e) => {
            Counters::bump(&ctx.counters.failed);
            warn!(url = %url, depth, elapsed_ms, "Fetch failed: {}", e);
            return Vec::new();
        }
    };
    Counters::bump(&ctx.counters.fetched);
    debug!(url = %url, depth, elapsed_ms, status = capture.status_code, "Fetched");

    // Store writes may block (SQLite), so they run off the async workers
    let store = ctx.store.clone();
    let (store_url, page) = (url.clone(), capture.clone());
    let stored = tokio::task::spawn_blocking(move || {
        store.store_or_update_snapshot(&store_url, &page)
    })
    .await
    .unwrap_or_else(|e| {
        Err(ScanError::StorageError(format!("snapshot write aborted: {}", e)))
    });

    match stored {
        Ok(true) => Counters::bump(&ctx.counters.stored),
        Ok(false) => {
            debug!("Content unchanged for {}", url);
            Counters::bump(&ctx.counters.unchanged);
        }
        Err(e) => {
            Counters::bump(&ctx.counters.storage_errors);
            warn!(url = %url, depth, elapsed_ms, "Storing snapshot failed: {}", e);
        }
    }

    let links = match extract_links(&capture.body, &ctx.scope, &url) {
        Ok(links) => links,
        Err(e) => {
            warn!(url = %url, depth, elapsed_ms, "Link extraction failed: {}", e);
            return Vec::new();
        }
    };

    let mut children = Vec::new();
    for link in links {
        let Some(link) = normalize_url(&link) else {
            continue;
        };
        if ctx.visited.mark(&link).await {
            debug!("Scheduling {} at depth {}", link, depth + 1);
            Counters::bump(&ctx.counters.scheduled);
            children.push(CrawlTarget {
                url: link,
                depth: depth + 1,
            });
        }
    }

    children
}
