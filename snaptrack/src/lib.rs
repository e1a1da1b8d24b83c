// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{crawl_options, open_database, parse_count, render_diff, run_crawl, tracked_url};
