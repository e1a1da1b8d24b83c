use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("snaptrack")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("snaptrack")
        .about("Crawl a domain and keep a diffable history of every page")
        .styles(CLAP_STYLING)
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .global(true)
                .help("Location of the snapshot database")
                .default_value("snapshots.db"),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl every page reachable from URL on the same origin and store a \
                snapshot of each page whose content changed.",
                )
                .arg(arg!(<URL>).required(true).help("The seed URL to crawl"))
                .arg(
                    // Kept as strings: a malformed number falls back to the default
                    arg!(-d --"max-depth" <N>)
                        .required(false)
                        .help("Maximum link depth from the seed (default: 3)"),
                )
                .arg(
                    arg!(-c --"concurrency" <N>)
                        .required(false)
                        .help("Maximum number of fetches in flight (default: 5)"),
                )
                .arg(
                    arg!(-q --"quiet")
                        .required(false)
                        .help("Suppress the progress spinner and the report")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(command!("list").about("List every tracked URL"))
        .subcommand(
            command!("diff")
                .about("Show what changed between the two newest snapshots of URL")
                .arg(arg!(<URL>).required(true).help("A tracked URL"))
                .arg(
                    arg!(--"no-color")
                        .required(false)
                        .help("Print the diff without ANSI colors")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("check")
                .about("Fetch URL once and store a new snapshot if its content changed")
                .arg(arg!(<URL>).required(true).help("The URL to recheck")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["snaptrack", "crawl", "http://a.test/"])
            .unwrap();

        assert_eq!(matches.get_one::<String>("db").unwrap(), "snapshots.db");
        let (name, crawl) = matches.subcommand().unwrap();
        assert_eq!(name, "crawl");
        assert_eq!(crawl.get_one::<String>("URL").unwrap(), "http://a.test/");
        assert!(crawl.get_one::<String>("max-depth").is_none());
        assert!(!crawl.get_flag("quiet"));
    }

    #[test]
    fn test_malformed_numbers_still_parse() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "snaptrack",
                "crawl",
                "http://a.test/",
                "--max-depth",
                "lots",
                "--concurrency",
                "many",
            ])
            .unwrap();

        let (_, crawl) = matches.subcommand().unwrap();
        assert_eq!(crawl.get_one::<String>("max-depth").unwrap(), "lots");
    }

    #[test]
    fn test_global_db_after_subcommand() {
        let matches = command_argument_builder()
            .try_get_matches_from(["snaptrack", "list", "--db", "/tmp/other.db"])
            .unwrap();

        let (_, list) = matches.subcommand().unwrap();
        assert_eq!(list.get_one::<String>("db").unwrap(), "/tmp/other.db");
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        let result = command_argument_builder().try_get_matches_from(["snaptrack", "purge"]);
        assert!(result.is_err());
    }
}
