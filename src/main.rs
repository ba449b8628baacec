mod config;
mod docx;
mod errors;
mod extractor;
mod importer;
mod logging;
mod models;
mod planner;
mod render;
mod segmenter;
mod store;
mod validator;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::importer::{ImportMode, Importer};
use crate::models::ImportReport;
use crate::store::SqliteStore;

struct CliArgs {
    input: Option<PathBuf>,
    strict: Option<bool>,
    dry_run: bool,
    show: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let mut config = Config::from_env()?;
    let args = parse_args()?;
    if let Some(strict) = args.strict {
        config.import.mode = if strict { "strict" } else { "lenient" }.to_string();
    }
    if args.dry_run {
        config.import.dry_run = true;
    }

    let _guard = setup_logging(&config)?;
    info!("Starting question bank importer");

    let store = SqliteStore::new(&config.database.url).await?;
    info!("Store initialized at {}", config.database.url);

    if let Some(question_id) = &args.show {
        return show_record(&store, question_id).await;
    }

    let input = args
        .input
        .ok_or_else(|| anyhow!("usage: question-bank-importer <file.docx> [--strict|--lenient] [--dry-run] | --show <question_id>"))?;

    let importer = Importer::new(store, config.import_options());
    let report = importer.import_path(&input).await?;

    print_report(&report, config.import.dry_run);

    let strict_aborted =
        config.import_options().mode == ImportMode::Strict && report.rejected > 0;
    if strict_aborted || report.store_error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_args() -> Result<CliArgs> {
    let mut args = CliArgs {
        input: None,
        strict: None,
        dry_run: false,
        show: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strict" => args.strict = Some(true),
            "--lenient" => args.strict = Some(false),
            "--dry-run" => args.dry_run = true,
            "--show" => {
                let id = iter
                    .next()
                    .ok_or_else(|| anyhow!("--show requires a question id"))?;
                args.show = Some(id);
            }
            other if other.starts_with("--") => {
                return Err(anyhow!("unknown flag '{}'", other));
            }
            path => {
                if args.input.is_some() {
                    return Err(anyhow!("only one input file is supported"));
                }
                args.input = Some(PathBuf::from(path));
            }
        }
    }
    Ok(args)
}

async fn show_record(store: &SqliteStore, question_id: &str) -> Result<()> {
    match store.get_record(question_id).await? {
        Some(record) => {
            for line in render::render_record(&record) {
                println!("{}", line);
            }
            Ok(())
        }
        None => Err(anyhow!("no record with id '{}'", question_id)),
    }
}

fn print_report(report: &ImportReport, dry_run: bool) {
    if dry_run {
        println!("(dry run - no writes performed)");
    }
    println!(
        "inserted: {}  updated: {}  skipped: {}  rejected: {}  warnings: {}",
        report.inserted, report.updated, report.skipped, report.rejected, report.warned
    );

    for rejection in &report.rejections {
        println!(
            "REJECTED {} lines {}-{} [{:?}]: {}",
            rejection.question_id.as_deref().unwrap_or("?"),
            rejection.line_range.0,
            rejection.line_range.1,
            rejection.kind,
            rejection.message
        );
    }
    for warning in &report.warnings {
        println!(
            "warning {} [{:?}]: {}",
            warning.question_id, warning.kind, warning.message
        );
    }
    if let Some(err) = &report.store_error {
        println!("STORE ERROR: {}", err);
    }
}

fn setup_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(true);

    if config.logging.file_enabled {
        std::fs::create_dir_all(&config.logging.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });
        let file_appender = tracing_appender::rolling::daily(
            &config.logging.log_directory,
            "question-bank-importer.log",
        );
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(non_blocking_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        Ok(None)
    }
}
