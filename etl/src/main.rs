use anyhow::Context;
use clap::{Arg, ArgMatches, Command, value_parser};
use common::config::Settings;
use etl::{RunError, RunReport};
use lakehouse::{TableQuery, TableStore};
use std::process;

const DEFAULT_CONFIG: &str = "config/etl.toml";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value(DEFAULT_CONFIG)
        .help("Sets a custom config file")
}

fn cli() -> Command {
    Command::new("etl-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loads the news feed into the lakehouse")
        .subcommand_required(true)
        .subcommand(
            Command::new("etl")
                .about("Run the ETL pipeline")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("create-database")
                .about("Create a database in the warehouse")
                .arg(Arg::new("name").required(true).value_name("NAME"))
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Print the first rows and commit history of a table")
                .arg(Arg::new("table").required(true).value_name("DB.TABLE"))
                .arg(config_arg())
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .value_name("LIMIT")
                        .value_parser(value_parser!(usize))
                        .help("Number of rows to print (defaults to preview_rows)"),
                ),
        )
}

fn load_settings(matches: &ArgMatches) -> anyhow::Result<Settings> {
    let path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG);
    let settings =
        Settings::new(path).with_context(|| format!("Failed to load config from {}", path))?;
    etl::init_tracing(settings.log_format);
    Ok(settings)
}

async fn run_etl(matches: &ArgMatches) -> anyhow::Result<()> {
    let settings = load_settings(matches)?;
    println!(
        "Starting ETL pipeline: {} -> {}",
        settings.source.path.display(),
        settings.sink.qualified_name()
    );

    match etl::run_with_settings(&settings).await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.report);
            eprintln!("{}", failure_note(&e));
            Err(anyhow::Error::new(e))
        }
    }
}

fn failure_note(err: &RunError) -> String {
    if err.source.is_write_error() {
        format!(
            "{} rejected the batch; no rows were written",
            err.report.table
        )
    } else {
        "Run stopped before writing; the table is unchanged".to_string()
    }
}

async fn create_database(matches: &ArgMatches) -> anyhow::Result<()> {
    let settings = load_settings(matches)?;
    let name = matches
        .get_one::<String>("name")
        .context("database name is required")?;

    let store = TableStore::open(&settings.sink.warehouse).await?;
    if store.create_database(name).await? {
        println!("Created database {} in {}", name, store.location());
    } else {
        println!("Database {} already exists in {}", name, store.location());
    }
    Ok(())
}

async fn show(matches: &ArgMatches) -> anyhow::Result<()> {
    let settings = load_settings(matches)?;
    let table = matches
        .get_one::<String>("table")
        .context("table name is required")?;
    let limit = matches
        .get_one::<usize>("limit")
        .copied()
        .unwrap_or(settings.preview_rows);

    let store = TableStore::open(&settings.sink.warehouse).await?;
    let history = store.history(table).await?;
    let rows = TableQuery::new(store).preview(table, limit).await?;

    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    println!("-- {} commits", history.len());
    for entry in &history {
        println!(
            "{:>4}  {}  {:?}  +{} rows  -{} files",
            entry.version,
            entry.timestamp.to_rfc3339(),
            entry.operation,
            entry.rows_added(),
            entry.removed.len()
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("etl", sub)) => run_etl(sub).await,
        Some(("create-database", sub)) => create_database(sub).await,
        Some(("show", sub)) => show(sub).await,
        _ => Err(anyhow::anyhow!("Please specify a valid subcommand")),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
