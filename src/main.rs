//! little-owl - run SQL on Amazon Athena from the terminal.

mod cli;
mod logging;
mod render;

use std::io::{self, IsTerminal, Read, Write};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use little_owl::{AthenaClient, CancellationToken, OwlConfig, QueryRunner};
use tracing::debug;

use cli::{Cli, Command, OutputFormat, QueryArgs};
use render::{render_table, CsvSink, Progress};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Query(args) => query(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn query(args: QueryArgs) -> anyhow::Result<()> {
    let sql = read_sql(&args)?;
    let config = args.apply(OwlConfig::from_env()?);
    debug!("using endpoint {}", config.endpoint_url());

    let client = AthenaClient::new(&config)?.with_options(args.client_options());
    let runner = QueryRunner::new(client, config.output_location.as_str())
        .with_wait_options(args.wait_options())
        .with_page_options(args.page_options());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match args.format {
        OutputFormat::Table => {
            let rows = runner.run_query_with_cancel(&sql, &cancel).await?;
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", render_table(&rows)).context("writing table")?;
        }
        OutputFormat::Csv => {
            let mut sink = CsvSink::new(io::stdout().lock(), Progress::stderr());
            runner
                .stream_query_with_cancel(&sql, &mut sink, &cancel)
                .await?;
            sink.into_inner()?;
        }
    }
    Ok(())
}

/// Takes SQL from the argument, or from stdin when it is piped in.
fn read_sql(args: &QueryArgs) -> anyhow::Result<String> {
    let sql = match &args.sql {
        Some(sql) => sql.clone(),
        None if !io::stdin().is_terminal() => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading SQL from stdin")?;
            buf
        }
        None => String::new(),
    };

    let sql = sql.trim();
    if sql.is_empty() {
        eprintln!("Input required");
        let _ = Cli::command().print_help();
        bail!("no SQL given");
    }
    Ok(sql.to_owned())
}
