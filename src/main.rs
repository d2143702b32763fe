use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};

use glia_census_lib::image_io::read_manifest;
use glia_census_lib::{process_manifest, Config, ErrorLog, MetricsWriter};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "glia_census - Microglial and neural cell census of z-stacks")]
struct Args {
    /// Directory the manifest entries are relative to
    #[clap(required_unless_present = "write_default_config")]
    data_root: Option<PathBuf>,

    /// File listing one image directory per line
    #[clap(required_unless_present = "write_default_config")]
    manifest: Option<PathBuf>,

    /// Receives the entries that could not be processed
    #[clap(required_unless_present = "write_default_config")]
    error_log: Option<PathBuf>,

    /// Metrics table to create
    #[clap(required_unless_present = "write_default_config")]
    metrics: Option<PathBuf>,

    /// Path to configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Root of the per-image result folders (overrides config)
    #[clap(short, long)]
    results: Option<PathBuf>,

    /// Save intermediate images and log more detail
    #[clap(short, long)]
    debug: bool,

    /// Process images one at a time
    #[clap(long)]
    sequential: bool,

    /// Write the default configuration to this path and exit
    #[clap(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { LevelFilter::Debug } else { LevelFilter::Info };
    // RUST_LOG still wins over the flag
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    if let Some(path) = &args.write_default_config {
        Config::default()
            .save_to_file(path)
            .with_context(|| format!("writing default configuration to {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(results) = &args.results {
        config.results_dir = results.to_string_lossy().into_owned();
    }
    if args.sequential {
        config.use_parallel = false;
    }
    config.validate().context("invalid configuration")?;

    // Clap guarantees the positionals once no template was requested
    let (Some(data_root), Some(manifest), Some(error_log_path), Some(metrics)) =
        (&args.data_root, &args.manifest, &args.error_log, &args.metrics)
    else {
        anyhow::bail!("data_root, manifest, error_log and metrics are required");
    };

    let entries = read_manifest(manifest).context("reading manifest")?;
    let mut error_log = ErrorLog::create(error_log_path)
        .with_context(|| format!("creating error log {}", error_log_path.display()))?;
    let mut writer = MetricsWriter::create(metrics, &config)
        .with_context(|| format!("creating metrics file {}", metrics.display()))?;

    info!("Processing {} images from {}", entries.len(), manifest.display());
    let start_time = Instant::now();

    let results_root = PathBuf::from(&config.results_dir);
    let outcome = process_manifest(data_root, &entries, &results_root, &config, args.debug);

    for row in &outcome.rows {
        writer.write_row(row).context("writing metrics row")?;
    }
    writer.finish().context("flushing metrics")?;

    for (entry, _) in &outcome.failures {
        error_log.record(entry).context("writing error log")?;
    }
    if !outcome.failures.is_empty() {
        warn!("{} of {} images failed", outcome.failures.len(), entries.len());
    }

    let elapsed = start_time.elapsed();
    info!(
        "Processing completed in {:.2} seconds: {} rows written",
        elapsed.as_secs_f64(),
        outcome.rows.len()
    );

    Ok(())
}
