mod file_config;

pub use file_config::{BackgroundJobsConfig, FileConfig};

use crate::consolidation::{ConsolidationOptions, DEFAULT_WINDOW_SECONDS};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// How the final report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub window_seconds: u32,
    pub dry_run: bool,
    pub report_format: ReportFormat,
    pub interval_hours: u64,
    pub run_on_startup: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            dry_run: false,
            report_format: ReportFormat::Text,
            interval_hours: 0,
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub window_seconds: u32,
    pub dry_run: bool,
    pub report_format: ReportFormat,
    pub background_jobs: BackgroundJobsSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJobsSettings {
    /// 0 means one-shot mode: run once and exit.
    pub interval_hours: u64,
    pub run_on_startup: bool,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            interval_hours: 0,
            run_on_startup: true,
        }
    }
}

impl BackgroundJobsSettings {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_hours > 0).then(|| Duration::from_secs(self.interval_hours * 60 * 60))
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified on the command line or in config file")
            })?;

        // The database file itself is created on first open.
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let window_seconds = file.window_seconds.unwrap_or(cli.window_seconds);
        if window_seconds == 0 {
            bail!("window_seconds must be greater than 0");
        }

        // A dry run requested on either side wins.
        let dry_run = cli.dry_run || file.dry_run.unwrap_or(false);

        let report_format = match file.report_format {
            Some(s) => parse_report_format(&s)
                .ok_or_else(|| anyhow::anyhow!("Invalid report_format in config file: {}", s))?,
            None => cli.report_format,
        };

        let jobs_file = file.background_jobs.unwrap_or_default();
        let background_jobs = BackgroundJobsSettings {
            interval_hours: jobs_file.interval_hours.unwrap_or(cli.interval_hours),
            run_on_startup: jobs_file.run_on_startup.unwrap_or(cli.run_on_startup),
        };

        Ok(AppConfig {
            db_path,
            window_seconds,
            dry_run,
            report_format,
            background_jobs,
        })
    }

    pub fn consolidation_options(&self) -> ConsolidationOptions {
        ConsolidationOptions {
            window_seconds: self.window_seconds,
            dry_run: self.dry_run,
        }
    }
}

/// Uses clap's ValueEnum trait for parsing.
fn parse_report_format(s: &str) -> Option<ReportFormat> {
    ReportFormat::from_str(s, true).ok()
}
