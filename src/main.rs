use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listening_consolidator::background_jobs::jobs::ListeningConsolidationJob;
use listening_consolidator::background_jobs::{JobContext, JobScheduler};
use listening_consolidator::config::{AppConfig, CliConfig, FileConfig, ReportFormat};
use listening_consolidator::consolidation::{run_consolidation_with_options, Report};
use listening_consolidator::history_store::{HistoryStore, SqliteHistoryStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(about = "Merges duplicate albums, tracks and play events in a listening history")]
struct CliArgs {
    /// Path to the SQLite listening history database.
    #[clap(value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Two plays of the same track at most this many seconds apart are one playback.
    #[clap(long, default_value_t = 600)]
    pub window_seconds: u32,

    /// Compute and print the report without modifying the database.
    #[clap(long)]
    pub dry_run: bool,

    /// Print the report as JSON.
    #[clap(long)]
    pub json: bool,

    /// Keep running and consolidate every N hours. 0 runs once and exits.
    #[clap(long, default_value_t = 0)]
    pub interval_hours: u64,

    /// In scheduled mode, skip the run at startup.
    #[clap(long)]
    pub no_startup_run: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            window_seconds: self.window_seconds,
            dry_run: self.dry_run,
            report_format: if self.json {
                ReportFormat::Json
            } else {
                ReportFormat::Text
            },
            interval_hours: self.interval_hours,
            run_on_startup: !self.no_startup_run,
        }
    }
}

fn print_report(report: &Report, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => println!("{}", report),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialize report")?
        ),
    }
    Ok(())
}

async fn run_scheduled(config: &AppConfig, store: Arc<dyn HistoryStore>) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    // No importer runs in this process, so nothing ever sends a hook event.
    let (_hook_sender, hook_receiver) = mpsc::channel(1);
    let job_context = JobContext::new(shutdown_token.child_token(), store);

    let mut scheduler = JobScheduler::new(hook_receiver, shutdown_token.clone(), job_context);
    scheduler.register_job(Arc::new(
        ListeningConsolidationJob::new(
            config.consolidation_options(),
            config.background_jobs.interval(),
            config.background_jobs.run_on_startup,
        )
        .without_import_hook(),
    ));

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating graceful shutdown");
            signal_token.cancel();
        }
    });

    scheduler.run().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening SQLite history database at {:?}...", config.db_path);
    let store = Arc::new(SqliteHistoryStore::new(&config.db_path)?);

    if config.background_jobs.interval().is_some() {
        info!(
            "Scheduled mode: consolidating every {} hours",
            config.background_jobs.interval_hours
        );
        return run_scheduled(&config, store).await;
    }

    let options = config.consolidation_options();
    let report = tokio::task::spawn_blocking(move || {
        run_consolidation_with_options(store.as_ref(), &options)
    })
    .await??;

    print_report(&report, config.report_format)
}
