//! floodex CLI - flood exposure statistics per region

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use floodex::core::reclassify::{flood_footprint, remap_codes, LCCS2_CROPLAND_CODES};
use floodex::io::event_catalog::{EventCatalog, DEFAULT_EVENT_PREFIX};
use floodex::io::raster_io::{RasterReader, RasterWriter};
use floodex::{run_pipeline, ExposureConfig};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "floodex")]
#[command(author, version, about = "Flood exposure statistics per administrative region", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a configured batch and write the exposure table
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the hazard events found in a directory
    Events {
        /// Directory of hazard rasters
        #[arg(short, long)]
        dir: PathBuf,
        /// Event file name prefix
        #[arg(short, long, default_value = DEFAULT_EVENT_PREFIX)]
        prefix: String,
        /// Event list CSV (ID, BEGAN, ENDED, MAINCAUSE)
        #[arg(short, long)]
        events: Option<PathBuf>,
        /// Only events starting on or after this date (YYYY-MM-DD)
        #[arg(short, long)]
        since: Option<NaiveDate>,
    },
    /// Prepare a hazard footprint or a cropland indicator raster
    Reclassify {
        /// Input raster
        #[arg(short, long)]
        input: PathBuf,
        /// Output GeoTIFF
        #[arg(short, long)]
        output: PathBuf,
        /// Flood band: 1 stays 1, everything else becomes no-data
        #[arg(long)]
        flood: bool,
        /// Class codes mapped to 1, everything else no-data (e.g. 25,35,36)
        #[arg(long, value_delimiter = ',', num_args = 1.., conflicts_with = "flood")]
        codes: Option<Vec<u16>>,
        /// Band to read
        #[arg(short, long, default_value = "1")]
        band: isize,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run { config } => run(config),
        Commands::Events {
            dir,
            prefix,
            events,
            since,
        } => list_events(dir, &prefix, events, since),
        Commands::Reclassify {
            input,
            output,
            flood,
            codes,
            band,
        } => reclassify(input, output, flood, codes, band),
        Commands::Info { input } => info(input),
    }
}

fn run(config_path: PathBuf) -> Result<()> {
    let start = Instant::now();
    let config = ExposureConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let output = run_pipeline(&config).context("Exposure run failed")?;

    let report = &output.report;
    println!(
        "{} exposure: {} events processed, {} skipped, {} regions",
        config.exposure.kind,
        report.processed.len(),
        report.skipped.len(),
        report.table.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {} ({:?}): {}", skipped.event_id, skipped.kind, skipped.reason);
    }
    println!("Period: {}", output.period);
    println!("Table: {}", output.table_path.display());
    println!("Done in {:.1?}", start.elapsed());
    Ok(())
}

fn list_events(dir: PathBuf, prefix: &str, events: Option<PathBuf>, since: Option<NaiveDate>) -> Result<()> {
    let mut catalog = EventCatalog::discover(&dir, prefix)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    if let Some(path) = events {
        let list = EventCatalog::from_csv(&path)
            .with_context(|| format!("Failed to read event list {}", path.display()))?;
        catalog.attach_causes(&list);
    }
    if let Some(date) = since {
        catalog = catalog.filter_since(date);
    }

    println!("{:>8}  {:<10}  {:<10}  {}", "id", "began", "ended", "cause");
    for event in catalog.events() {
        println!(
            "{:>8}  {:<10}  {:<10}  {}",
            event.id,
            event.start_date,
            event.end_date,
            event.cause.as_deref().unwrap_or("-")
        );
    }
    println!("{} events", catalog.len());
    Ok(())
}

fn reclassify(input: PathBuf, output: PathBuf, flood: bool, codes: Option<Vec<u16>>, band: isize) -> Result<()> {
    let raster = RasterReader::read_raster(&input, band)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let prepared = match (flood, codes) {
        (true, _) => flood_footprint(&raster),
        (false, Some(codes)) => remap_codes(&raster, &codes),
        (false, None) => {
            log::info!("No mode given, using cropland codes {:?}", LCCS2_CROPLAND_CODES);
            remap_codes(&raster, &LCCS2_CROPLAND_CODES)
        }
    };

    if prepared.defined_count() == 0 {
        bail!("Reclassified raster {} has no defined pixels", input.display());
    }

    RasterWriter::write_raster(&prepared, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} ({} of {} pixels set)",
        output.display(),
        prepared.defined_count(),
        prepared.data.len()
    );
    Ok(())
}

fn info(input: PathBuf) -> Result<()> {
    let info = RasterReader::describe(&input).with_context(|| format!("Failed to open {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Size: {} x {} ({} bands)", info.width, info.height, info.band_count);
    println!("Resolution: {}", info.transform.resolution());
    println!("Origin: ({}, {})", info.transform.top_left_x, info.transform.top_left_y);
    println!("Reference: {}", info.reference.label());
    match info.no_data {
        Some(nd) => println!("No-data: {}", nd),
        None => println!("No-data: none"),
    }
    Ok(())
}
