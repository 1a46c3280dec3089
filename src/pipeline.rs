//! End-to-end run driven by an `ExposureConfig`: discover events, aggregate,
//! export.

use crate::config::ExposureConfig;
use crate::core::aggregator::{ExposureAggregator, RunReport};
use crate::io::event_catalog::{EventCatalog, HazardDirectory};
use crate::io::exposure_catalog::ExposureDirectory;
use crate::io::regions::RegionLayer;
use crate::io::table_export::{period_label, write_csv, ColumnNames};
use crate::io::workspace::Workspace;
use crate::types::{ExposureResult, HazardEvent};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// What a pipeline run produced
#[derive(Debug)]
pub struct PipelineOutput {
    pub report: RunReport,
    /// Period label used in the summary column names
    pub period: String,
    pub table_path: PathBuf,
}

/// Hazard events selected by the configuration, ascending id
pub fn select_events(config: &ExposureConfig) -> ExposureResult<Vec<HazardEvent>> {
    let mut catalog = EventCatalog::discover(config.resolve(&config.hazard.directory), &config.hazard.prefix)?;

    if let Some(list_path) = &config.hazard.events {
        let list = EventCatalog::from_csv(config.resolve(list_path))?;
        catalog.attach_causes(&list);
        let discovered = catalog.len();
        catalog = catalog.restrict_to(&list);
        if catalog.len() < discovered {
            log::info!(
                "{} discovered rasters are not in the event list",
                discovered - catalog.len()
            );
        }
    }

    if let Some(since) = config.hazard.since {
        catalog = catalog.filter_since(since);
    }

    Ok(catalog.into_events())
}

/// Exposure layer lookup built from the `[exposure]` section
pub fn exposure_directory(config: &ExposureConfig) -> ExposureResult<ExposureDirectory> {
    let layer = &config.exposure;
    let directory = ExposureDirectory::new(config.resolve(&layer.directory), &layer.pattern)?.with_band(layer.band);

    Ok(match &layer.remap_codes {
        Some(codes) => directory.with_remap(codes.clone()),
        None => directory,
    })
}

/// Warn up front about event years without an exposure layer
fn check_exposure_years(exposures: &ExposureDirectory, events: &[HazardEvent]) {
    let years = match exposures.available_years() {
        Ok(years) => years,
        Err(e) => {
            log::warn!("Could not list exposure layers: {}", e);
            return;
        }
    };
    log::info!("Exposure layers available for {:?}", years);

    let missing: BTreeSet<i32> = events
        .iter()
        .map(|e| e.year())
        .filter(|year| !years.contains(year))
        .collect();
    if !missing.is_empty() {
        log::warn!("No exposure layer for {:?}; events from those years will be skipped", missing);
    }
}

/// Run the whole workflow and write the output table
pub fn run_pipeline(config: &ExposureConfig) -> ExposureResult<PipelineOutput> {
    let layer = RegionLayer::load(
        config.regions.table.as_ref().map(|p| config.resolve(p)).as_deref(),
        config.resolve(&config.regions.zones),
        &config.regions.id_column,
        &config.regions.name_column,
    )?;

    let events = select_events(config)?;
    let hazards = HazardDirectory {
        band: config.hazard.band,
        reclassify: config.hazard.reclassify,
    };
    let exposures = exposure_directory(config)?;
    check_exposure_years(&exposures, &events);

    let workspace = match &config.output.intermediates {
        Some(dir) => Some(Workspace::create(config.resolve(dir))?),
        None => None,
    };

    let mut aggregator = ExposureAggregator::new(config.aggregator_params());
    if let Some(ws) = &workspace {
        aggregator = aggregator.with_sink(ws);
    }

    let report = aggregator.run(&layer.regions, &layer.zones, &events, &hazards, &exposures)?;
    if !report.skipped.is_empty() {
        log::warn!("{} of {} events were skipped", report.skipped.len(), events.len());
    }

    let period = match &config.output.period {
        Some(period) => period.clone(),
        None => derived_period(&report, &events),
    };

    let names = ColumnNames::new(config.exposure.kind, &config.hazard.prefix, &period);
    let table_path = config.resolve(&config.output.table);
    write_csv(&report.table, &names, &table_path)?;

    Ok(PipelineOutput {
        report,
        period,
        table_path,
    })
}

/// Year span of the processed events, falling back to every selected event
fn derived_period(report: &RunReport, events: &[HazardEvent]) -> String {
    let span = report.year_span().or_else(|| {
        let first = events.iter().map(|e| e.year()).min()?;
        let last = events.iter().map(|e| e.year()).max()?;
        Some((first, last))
    });
    match span {
        Some((first, last)) => period_label(first, last),
        None => "all".to_string(),
    }
}
