use colored::Colorize;
use commands::command_argument_builder;
use snaptrack::handlers::{handle_check, handle_crawl, handle_diff, handle_list};
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let chosen_command = command_argument_builder().get_matches();
    let db_path = chosen_command
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or("snapshots.db");

    let result = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, db_path).await,
        Some(("list", _)) => handle_list(db_path),
        Some(("diff", primary_command)) => handle_diff(primary_command, db_path),
        Some(("check", primary_command)) => handle_check(primary_command, db_path).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
