use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use snaptrack_core::crawl::{
    CrawlOptions, execute_crawl, generate_crawl_report, latest_snapshots_in_scope,
};
use snaptrack_core::data::Database;
use snaptrack_core::diff::{diff_stats, generate_diff};
use snaptrack_core::history::{NOT_ENOUGH_HISTORY, list_urls, recheck_url};
use snaptrack_scanner::crawler::{DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_DEPTH};
use snaptrack_scanner::links::normalize_url;
use snaptrack_scanner::{CrawlStats, Fetcher, HttpFetcher, SnapshotStore};
use std::path::Path;
use std::sync::Arc;

/// Parse a numeric flag, keeping `default` when the flag is absent or malformed
pub fn parse_count(raw: Option<&String>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// Open (creating if needed) the snapshot database, expanding a leading `~`
pub fn open_database(path: &str) -> Result<Arc<Database>> {
    let expanded = shellexpand::tilde(path);
    let db_path = Path::new(expanded.as_ref());
    let db = Database::new(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    Ok(Arc::new(db))
}

/// Canonical key a URL is stored under
pub fn tracked_url(raw: &str) -> Result<String> {
    normalize_url(raw).ok_or_else(|| anyhow!("Invalid URL '{}'", raw))
}

pub fn crawl_options(
    url: &str,
    max_depth: Option<&String>,
    concurrency: Option<&String>,
    quiet: bool,
) -> CrawlOptions {
    let mut options = CrawlOptions::new(url);
    options.config.max_depth = parse_count(max_depth, DEFAULT_MAX_DEPTH);
    options.config.concurrency = parse_count(concurrency, DEFAULT_CONCURRENCY);
    options.show_progress_bars = !quiet;
    options
}

/// Crawl with `fetcher` into `store` and build the report for the seed's origin
pub async fn run_crawl(
    options: CrawlOptions,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn SnapshotStore>,
) -> Result<(CrawlStats, String)> {
    let seed = options.url.clone();
    let stats = execute_crawl(options, fetcher, store.clone()).await?;
    let pages = latest_snapshots_in_scope(store.as_ref(), &seed)?;
    Ok((stats, generate_crawl_report(&stats, &pages)))
}

/// Diff of the two newest snapshots, followed by a one-line change summary.
///
/// The history is read once so the diff and the summary always describe the same pair.
pub fn render_diff(store: &dyn SnapshotStore, url: &str, with_color: bool) -> Result<String> {
    let url = tracked_url(url)?;
    let snapshots = store.snapshots_for_url(&url)?;
    let [latest, previous, ..] = snapshots.as_slice() else {
        return Ok(NOT_ENOUGH_HISTORY.to_string());
    };

    let stats = diff_stats(&previous.html_body, &latest.html_body);
    let mut output = generate_diff(&previous.html_body, &latest.html_body, with_color);
    output.push('\n');
    output.push_str(&format!(
        "{} line(s) added, {} line(s) removed between {} and {}",
        stats.added,
        stats.removed,
        previous.created_at.format("%Y-%m-%d %H:%M:%S"),
        latest.created_at.format("%Y-%m-%d %H:%M:%S"),
    ));

    Ok(output)
}

pub async fn handle_crawl(args: &ArgMatches, db_path: &str) -> Result<()> {
    let url = args
        .get_one::<String>("URL")
        .ok_or_else(|| anyhow!("A seed URL is required"))?;
    let quiet = args.get_flag("quiet");
    let options = crawl_options(
        url,
        args.get_one::<String>("max-depth"),
        args.get_one::<String>("concurrency"),
        quiet,
    );

    if !quiet {
        println!("\n{} {}", "Crawling".bright_cyan().bold(), url);
        println!("Max depth: {}", options.config.max_depth);
        println!("Concurrency: {}\n", options.config.concurrency);
    }

    let store = open_database(db_path)?;
    let fetcher = Arc::new(HttpFetcher::new()?);
    let (stats, report) = run_crawl(options, fetcher, store)
        .await
        .context("Crawl failed")?;

    if quiet {
        println!(
            "{} pages fetched, {} new snapshots",
            stats.fetched, stats.stored
        );
    } else {
        println!("\n{} Crawl complete!\n", "✓".green());
        print!("{}", report);
    }
    Ok(())
}

pub fn handle_list(db_path: &str) -> Result<()> {
    let store = open_database(db_path)?;
    let urls = list_urls(store.as_ref())?;

    if urls.is_empty() {
        println!("No URLs tracked yet. Run `snaptrack crawl <URL>` first.");
        return Ok(());
    }

    for url in urls {
        println!("{}", url);
    }
    Ok(())
}

pub fn handle_diff(args: &ArgMatches, db_path: &str) -> Result<()> {
    let url = args
        .get_one::<String>("URL")
        .ok_or_else(|| anyhow!("A URL is required"))?;
    let with_color = !args.get_flag("no-color");

    let store = open_database(db_path)?;
    println!("{}", render_diff(store.as_ref(), url, with_color)?);
    Ok(())
}

pub async fn handle_check(args: &ArgMatches, db_path: &str) -> Result<()> {
    let url = args
        .get_one::<String>("URL")
        .ok_or_else(|| anyhow!("A URL is required"))?;
    let url = tracked_url(url)?;

    let store = open_database(db_path)?;
    let fetcher = HttpFetcher::new()?;
    let message = recheck_url(store.as_ref(), &fetcher, &url, DEFAULT_FETCH_TIMEOUT)
        .await
        .with_context(|| format!("Failed to check {}", url))?;

    println!("{} {}", "✓".green(), message);
    Ok(())
}
