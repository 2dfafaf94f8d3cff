//! Tile mosaic ingester.
//!
//! Composites scene files into the tile store described by a YAML
//! configuration and exits non-zero when any tile failed.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use compositor::CompositeMode;
use ingester::{collect_scene_paths, run_scenes};
use ingestion::{IngestionConfig, IngestionDriver, LoggingConfig, TileLocks};

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Composite scene rasters into the tile mosaic")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "INGESTER_CONFIG", default_value = "/etc/ingester/config.yaml")]
    config: PathBuf,

    /// Scene files to ingest
    scenes: Vec<PathBuf>,

    /// Directory searched recursively for *.tile scene files
    #[arg(long)]
    scene_dir: Option<PathBuf>,

    /// Compositing mode (overwrite-no-data-only or overwrite-all); defaults to the configured mode
    #[arg(short, long)]
    mode: Option<CompositeMode>,

    /// Log level; overrides the configured level
    #[arg(long)]
    log_level: Option<String>,

    /// Write the JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = ?e, "Ingestion aborted");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every tile of every scene succeeded.
fn run(args: Args) -> Result<bool> {
    let config = IngestionConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_tracing(&config.logging, args.log_level.as_deref())?;
    info!(config = %args.config.display(), "Starting tile mosaic ingester");

    let scenes = collect_scene_paths(&args.scenes, args.scene_dir.as_deref())?;
    if scenes.is_empty() {
        info!("No scenes to ingest");
        return Ok(true);
    }

    let locks = Arc::new(TileLocks::new());
    let driver = IngestionDriver::from_config(&config)
        .context("Failed to initialize ingestion driver")?
        .with_locks(locks);
    let mode = args.mode.unwrap_or(config.compositing.default_mode);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let summary = runtime.block_on(run_scenes(
        Arc::new(driver),
        scenes,
        mode,
        config.parallel_scenes,
    ));

    if let Some(path) = &args.report {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .context("Failed to write report")?;
        info!(path = %path.display(), "Wrote run report");
    }

    for scene in summary.scenes.iter().filter(|s| s.failed()) {
        error!(path = %scene.path.display(), "Scene had failures");
    }
    Ok(!summary.has_failures())
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
