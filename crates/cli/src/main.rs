//! GeoQC CLI - technical quality control of geospatial datasets.

use anyhow::{Context, Result};
use clap::Parser;
use geoqc_checks::{CheckCatalog, DescriptorBackend, GeoBackend};
use geoqc_core::QcConfig;
use geoqc_quality::{BatchDriver, BatchOptions, EngineContext};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geoqc")]
#[command(about = "Run configured QC checks on raster and vector datasets", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Dataset to check, or a .txt/.csv manifest with one path per line
    #[arg(short = 'i', long = "test-input", alias = "test_input")]
    test_input: PathBuf,

    /// Do not copy accepted files to the configured destination
    #[arg(long, alias = "check_only")]
    check_only: bool,

    /// Exit with status 1 when any file fails QC
    #[arg(long)]
    fail_on_error: bool,

    /// Log filter, e.g. `debug` or `geoqc_quality=trace`; overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("Invalid log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = QcConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    let gate = cli.fail_on_error || config.fail_on_error;

    let backend: Arc<dyn GeoBackend> = Arc::new(DescriptorBackend::new());
    let catalog = CheckCatalog::builtin().with_commands(&config.checks);
    info!(checks = catalog.len(), "Check catalog ready");
    let context = EngineContext::new(backend).with_catalog(Arc::new(catalog));

    let driver = BatchDriver::new(
        Arc::new(config),
        context,
        BatchOptions {
            check_only: cli.check_only,
        },
    );
    let outcome = driver.run(&cli.test_input).await?;

    for (file, reason) in &outcome.failures {
        println!("{}: {}", file.display(), reason);
    }
    for report in &outcome.reports {
        println!("{}: {}", report.target.display(), report.summary_line());
    }
    if let Some(path) = &outcome.summary_path {
        println!("Summary: {}", path.display());
    }

    if gate && !outcome.all_passed() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
