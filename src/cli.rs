//! Command-line arguments for `little-owl`.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use little_owl::{ClientOptions, OwlConfig, PageOptions, WaitOptions};

const EXAMPLES: &str = "\
Examples:
  $ little-owl query \"SELECT count(*) FROM osm.changesets\"
  $ echo \"SELECT * FROM osm.changesets LIMIT 10\" | little-owl query --format csv";

/// Run SQL on Amazon Athena from the terminal.
#[derive(Parser, Debug)]
#[command(name = "little-owl")]
#[command(version, about, long_about = None, after_help = EXAMPLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a statement and print its results
    Query(QueryArgs),
}

/// How results are written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Buffer every row and print a table
    #[default]
    Table,
    /// Stream comma-separated values as pages arrive
    Csv,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL statement; read from stdin when omitted and stdin is not a terminal
    #[arg(value_name = "SQL")]
    pub sql: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// AWS region (overrides AWS_REGION)
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// S3 location for result files (overrides AWS_OUTPUT_BUCKET)
    #[arg(long, value_name = "S3_URI")]
    pub output_location: Option<String>,

    /// Athena endpoint URL (overrides ATHENA_ENDPOINT)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Delay between status checks
    #[arg(long, value_name = "MS", env = "LITTLE_OWL_POLL_INTERVAL_MS", default_value_t = 3000)]
    pub poll_interval_ms: u64,

    /// Give up after this many status checks
    #[arg(long, value_name = "N")]
    pub max_polls: Option<u32>,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Rows requested per result page (1-1000)
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1000,
        value_parser = clap::value_parser!(i32).range(1..=1000)
    )]
    pub max_rows: i32,

    /// Retries for transient HTTP failures of a single call
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: usize,

    /// Stop the query on Athena when interrupted with Ctrl-C
    #[arg(long)]
    pub stop_on_cancel: bool,
}

impl QueryArgs {
    /// Applies command-line overrides on top of environment configuration.
    pub fn apply(&self, mut config: OwlConfig) -> OwlConfig {
        if let Some(region) = &self.region {
            config = config.with_region(region);
        }
        if let Some(output_location) = &self.output_location {
            config = config.with_output_location(output_location);
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        config
    }

    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_polls: self.max_polls,
            deadline: self.timeout_secs.map(Duration::from_secs),
            stop_on_cancel: self.stop_on_cancel,
        }
    }

    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            max_rows: self.max_rows,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            max_retries: self.retries,
            ..ClientOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use little_owl::{Credentials, OwlConfig};

    use super::{Cli, Command, OutputFormat};

    fn query_args(argv: &[&str]) -> super::QueryArgs {
        let cli = Cli::try_parse_from(argv).expect("must parse");
        match cli.command {
            Command::Query(args) => args,
        }
    }

    #[test]
    fn parses_positional_sql_with_defaults() {
        let args = query_args(&["little-owl", "query", "SELECT 1"]);
        assert_eq!(args.sql.as_deref(), Some("SELECT 1"));
        assert_eq!(args.format, OutputFormat::Table);
        assert_eq!(args.max_rows, 1000);
        assert!(!args.stop_on_cancel);
    }

    #[test]
    fn sql_is_optional_for_stdin_input() {
        let args = query_args(&["little-owl", "query", "--format", "csv"]);
        assert_eq!(args.sql, None);
        assert_eq!(args.format, OutputFormat::Csv);
    }

    #[test]
    fn builds_wait_options() {
        let args = query_args(&[
            "little-owl",
            "query",
            "--poll-interval-ms",
            "500",
            "--max-polls",
            "20",
            "--timeout-secs",
            "60",
            "--stop-on-cancel",
            "SELECT 1",
        ]);
        let options = args.wait_options();
        assert_eq!(options.poll_interval, Duration::from_millis(500));
        assert_eq!(options.max_polls, Some(20));
        assert_eq!(options.deadline, Some(Duration::from_secs(60)));
        assert!(options.stop_on_cancel);
    }

    #[test]
    fn flags_override_config() {
        let args = query_args(&[
            "little-owl",
            "query",
            "--region",
            "eu-central-1",
            "--output-location",
            "s3://mine/",
            "SELECT 1",
        ]);
        let config = args.apply(OwlConfig::new(Credentials::new("AKID", "secret")));
        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.output_location, "s3://mine/");
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn max_rows_must_fit_a_result_page() {
        let args = query_args(&["little-owl", "query", "--max-rows", "250", "SELECT 1"]);
        assert_eq!(args.page_options().max_rows, 250);

        for bad in ["0", "1001", "-5"] {
            let parsed =
                Cli::try_parse_from(["little-owl", "query", "--max-rows", bad, "SELECT 1"]);
            assert!(parsed.is_err(), "--max-rows {bad} must be rejected");
        }
    }

    #[test]
    fn query_subcommand_is_required() {
        assert!(Cli::try_parse_from(["little-owl"]).is_err());
    }
}
