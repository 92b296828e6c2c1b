mod cli;
mod config;
mod storage;

use std::path::{Path, PathBuf};

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::Result;
use salesvault_core::{Table, ValidationReport};
use salesvault_etl::LoadOutcome;
use salesvault_storage::KeyStore;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point wiring the CLI to storage and the dataset loader.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();
    let mut config = config::load(cli.config.as_deref())?;
    init_tracing(config.log_level.as_deref());

    match cli.command {
        Command::Encrypt { source, pattern } => run_encrypt(&mut config, source, &pattern)?,
        Command::Load {
            periods,
            parallel,
            json,
        } => run_load(&mut config, periods, parallel, json).await?,
        Command::Summary { json } => run_summary(&mut config, json)?,
        Command::Keygen => println!("{}", KeyStore::generate().to_hex()),
        Command::Version => print_version(),
        Command::Health => run_health_check(&mut config)?,
        Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref())?,
    }

    Ok(())
}

fn init_tracing(configured: Option<&str>) {
    // RUST_LOG wins, then the config file, then info. Logs go to stderr so stdout stays parseable.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("salesvault {}", env!("CARGO_PKG_VERSION"));
}

fn run_encrypt(
    config: &mut config::Config,
    source: Option<PathBuf>,
    pattern: &str,
) -> Result<()> {
    let manager = storage::manager_from_config(config)?;
    let source = match source {
        Some(dir) => dir,
        None => config.source_dir()?,
    };

    let written = manager.encrypt_all(&source, pattern)?;
    for blob in &written {
        println!("{}", blob.display());
    }
    println!(
        "Encrypted {} file(s) into {}",
        written.len(),
        manager.encrypted_dir().display()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct FailedPeriod {
    identifier: String,
    error: String,
}

/// Machine-readable view of a load, printed by `load --json`.
#[derive(Debug, Serialize)]
struct LoadSummary<'a> {
    records: usize,
    columns: &'a [String],
    succeeded: &'a [String],
    failed: Vec<FailedPeriod>,
    reports: &'a [ValidationReport],
}

impl<'a> From<&'a LoadOutcome> for LoadSummary<'a> {
    fn from(outcome: &'a LoadOutcome) -> Self {
        Self {
            records: outcome.table.len(),
            columns: outcome.table.columns(),
            succeeded: &outcome.succeeded,
            failed: outcome
                .failures
                .iter()
                .map(|f| FailedPeriod {
                    identifier: f.identifier.clone(),
                    error: f.error.to_string(),
                })
                .collect(),
            reports: &outcome.reports,
        }
    }
}

async fn run_load(
    config: &mut config::Config,
    periods: Vec<String>,
    parallel: bool,
    json: bool,
) -> Result<()> {
    let loader = storage::loader_from_config(config)?;
    let requested = if periods.is_empty() {
        loader.layout().periods.len()
    } else {
        periods.len()
    };

    let outcome = match (parallel, periods.is_empty()) {
        (true, true) => loader.load_all_concurrent(&loader.layout().periods).await?,
        (true, false) => loader.load_all_concurrent(&periods).await?,
        (false, true) => loader.load_configured()?,
        (false, false) => loader.load_all(&periods)?,
    };

    let summary = LoadSummary::from(&outcome);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "Loaded {} record(s) from {} of {} period(s)",
        summary.records,
        summary.succeeded.len(),
        requested
    );
    for failed in &summary.failed {
        println!("  failed {}: {}", failed.identifier, failed.error);
    }
    for report in summary.reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!(
        "{}: {} record(s), {} valid, {} column(s), {} duplicate(s)",
        report.source,
        report.total_records,
        report.valid_records,
        report.columns,
        report.duplicates
    );
    for column in report.null_counts.iter().filter(|c| c.nulls > 0) {
        println!("    {}: {} null(s)", column.column, column.nulls);
    }
}

fn run_summary(config: &mut config::Config, json: bool) -> Result<()> {
    let loader = storage::loader_from_config(config)?;
    let summary_name = &loader.layout().summary;
    let table: Table = loader.load_summary(summary_name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else if table.width() == 0 {
        println!("No {summary_name} source found");
    } else {
        println!(
            "{summary_name}: {} record(s), {} column(s)",
            table.len(),
            table.width()
        );
    }
    Ok(())
}

/// Runs a quick health check of the key and the encrypt/decrypt path.
fn run_health_check(config: &mut config::Config) -> Result<()> {
    let key = storage::key_from_config(config)?;
    println!("Key: ok");
    storage::probe(key)?;
    println!("Cipher: ok");

    let encrypted_dir = config.encrypted_dir()?;
    match count_blobs(&encrypted_dir) {
        Some(count) => println!("Encrypted dir: {} ({count} blob(s))", encrypted_dir.display()),
        None => println!("Encrypted dir: {} (missing)", encrypted_dir.display()),
    }
    Ok(())
}

fn count_blobs(dir: &Path) -> Option<usize> {
    let entries = std::fs::read_dir(dir).ok()?;
    Some(
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().extension().and_then(|e| e.to_str())
                    == Some(salesvault_storage::BLOB_EXTENSION)
            })
            .count(),
    )
}

fn init_config(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let path = config::write_default_if_missing(&config::Config::template()?, &path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
