use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use snaptrack_scanner::links::in_scope;
use snaptrack_scanner::{
    CrawlConfig, CrawlStats, Crawler, Fetcher, ProgressCallback, Result, ScanError, Snapshot,
    SnapshotStore,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub url: String,
    pub config: CrawlConfig,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: CrawlConfig::default(),
            show_progress_bars: false,
        }
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options, storing snapshots into `store`
pub async fn execute_crawl(
    options: CrawlOptions,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn SnapshotStore>,
) -> Result<CrawlStats> {
    let CrawlOptions {
        url,
        config,
        show_progress_bars,
    } = options;

    let mut crawler = Crawler::new(fetcher, store).with_config(config);

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");

        let pb = Arc::new(pb);
        let pb_clone = pb.clone();
        let processed_count = Arc::new(AtomicUsize::new(0));
        let callback: ProgressCallback = Arc::new(move |page_url: String, depth: usize| {
            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Crawling... {} pages fetched (depth {}: {})",
                count,
                depth,
                extract_url_path(&page_url)
            ));
        });
        crawler = crawler.with_progress_callback(callback);
        Some(pb)
    } else {
        None
    };

    let result = crawler.crawl(&url).await;

    if let Some(pb) = progress_bar {
        match &result {
            Ok(stats) => pb.finish_with_message(format!(
                "Crawl complete! {} pages fetched, {} new snapshots",
                stats.fetched, stats.stored
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    result
}

/// Newest snapshot of every stored page that shares `seed_url`'s origin
pub fn latest_snapshots_in_scope(
    store: &dyn SnapshotStore,
    seed_url: &str,
) -> Result<Vec<Snapshot>> {
    let scope = Url::parse(seed_url).map_err(|e| ScanError::InvalidSeed(e.to_string()))?;

    let mut snapshots = Vec::new();
    for url in store.distinct_urls()? {
        let keep = Url::parse(&url)
            .map(|u| in_scope(&u, &scope))
            .unwrap_or(false);
        if keep {
            snapshots.push(store.last_snapshot(&url)?);
        }
    }
    Ok(snapshots)
}

fn colorize_status(status_code: u16) -> String {
    let status = status_code.to_string();
    match status_code {
        100..=199 => status.white().to_string(),
        200..=299 => status.green().to_string(),
        300..=399 => status.cyan().to_string(),
        400..=499 => status.yellow().to_string(),
        500..=599 => status.red().to_string(),
        _ => status,
    }
}

/// Generate a crawl report from the run's counters and the newest stored pages
pub fn generate_crawl_report(stats: &CrawlStats, pages: &[Snapshot]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages scheduled: {}\n", stats.scheduled));
    report.push_str(&format!("  Pages fetched: {}\n", stats.fetched));
    report.push_str(&format!("  Fetch failures: {}\n", stats.failed));
    report.push_str(&format!("  New snapshots: {}\n", stats.stored));
    report.push_str(&format!("  Unchanged pages: {}\n", stats.unchanged));
    if stats.storage_errors > 0 {
        report.push_str(&format!("  Storage errors: {}\n", stats.storage_errors));
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Group pages by host
    let mut by_host: BTreeMap<String, Vec<&Snapshot>> = BTreeMap::new();
    for page in pages {
        if let Ok(url) = Url::parse(&page.url)
            && let Some(host) = url.host_str()
        {
            by_host.entry(host.to_string()).or_default().push(page);
        }
    }

    for (host, host_pages) in by_host.iter() {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages tracked\n\n", host_pages.len()));

        for page in host_pages {
            report.push_str(&format!(
                "  {} {}\n",
                colorize_status(page.status_code),
                extract_url_path(&page.url)
            ));
        }
        report.push('\n');
    }

    report
}
