use crate::core::align::align;
use crate::core::exposure_table::ExposureTable;
use crate::core::masking::mask_by_hazard;
use crate::core::sources::{ExposureSource, HazardSource};
use crate::core::zonal::{zonal_sum, zonal_sum_resampled, ValueUnit};
use crate::types::{
    EventId, ExposureError, ExposureKind, ExposureResult, HazardEvent, Raster, Region, RegionId,
    ZoneRaster,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Pause the batch after a fixed number of events
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownPolicy {
    /// Events attempted between pauses
    pub every: usize,
    pub pause: Duration,
}

impl CooldownPolicy {
    pub fn new(every: usize, pause: Duration) -> Self {
        Self { every, pause }
    }

    /// Whether a pause is due after `attempted` events
    pub fn is_due(&self, attempted: usize) -> bool {
        self.every > 0 && attempted > 0 && attempted % self.every == 0
    }
}

/// Aggregation parameters
#[derive(Debug, Clone)]
pub struct AggregatorParams {
    pub kind: ExposureKind,
    pub unit: ValueUnit,
    pub cooldown: Option<CooldownPolicy>,
}

impl AggregatorParams {
    /// Population counts, rounded to whole people
    pub fn population() -> Self {
        Self {
            kind: ExposureKind::Population,
            unit: ValueUnit::Count,
            cooldown: None,
        }
    }

    /// Cropland indicator reported in hectares
    pub fn cropland(pixel_area_m2: Option<f64>) -> Self {
        Self {
            kind: ExposureKind::Cropland,
            unit: ValueUnit::Hectares { pixel_area_m2 },
            cooldown: None,
        }
    }
}

/// Receives intermediate rasters produced while processing an event
pub trait IntermediateSink {
    fn exposed_raster(&self, event: &HazardEvent, kind: ExposureKind, raster: &Raster) -> ExposureResult<()>;
}

/// Why an event contributed no statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    ReferenceMismatch,
    MissingExposureLayer,
    Failed,
}

impl SkipKind {
    fn from_error(err: &ExposureError) -> Self {
        match err {
            ExposureError::ReferenceMismatch { .. }
            | ExposureError::ZoneReferenceMismatch { .. }
            | ExposureError::UndefinedReference(_) => SkipKind::ReferenceMismatch,
            ExposureError::MissingExposureLayer(_) => SkipKind::MissingExposureLayer,
            _ => SkipKind::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedEvent {
    pub event_id: EventId,
    pub kind: SkipKind,
    pub reason: String,
}

/// Per-region totals and exposed values for one event
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub totals: BTreeMap<RegionId, f64>,
    pub exposed: BTreeMap<RegionId, f64>,
}

/// Result of a batch run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub table: ExposureTable,
    /// Events that contributed statistics, ascending id
    pub processed: Vec<HazardEvent>,
    pub skipped: Vec<SkippedEvent>,
}

impl RunReport {
    pub fn processed_ids(&self) -> Vec<EventId> {
        self.processed.iter().map(|e| e.id).collect()
    }

    /// First and last calendar year of the processed events
    pub fn year_span(&self) -> Option<(i32, i32)> {
        let first = self.processed.iter().map(|e| e.year()).min()?;
        let last = self.processed.iter().map(|e| e.year()).max()?;
        Some((first, last))
    }
}

/// Computes per-region exposure statistics for a batch of hazard events
pub struct ExposureAggregator<'a> {
    params: AggregatorParams,
    sink: Option<&'a dyn IntermediateSink>,
}

impl<'a> ExposureAggregator<'a> {
    pub fn new(params: AggregatorParams) -> Self {
        Self { params, sink: None }
    }

    pub fn with_sink(mut self, sink: &'a dyn IntermediateSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn params(&self) -> &AggregatorParams {
        &self.params
    }

    /// Process every event and derive the summary statistics.
    ///
    /// Events are handled one at a time in ascending id order. A failing event
    /// is logged and skipped; its statistics are never partially written.
    pub fn run(
        &self,
        regions: &[Region],
        zones: &ZoneRaster,
        events: &[HazardEvent],
        hazards: &dyn HazardSource,
        exposures: &dyn ExposureSource,
    ) -> ExposureResult<RunReport> {
        if regions.is_empty() {
            return Err(ExposureError::EmptyRegions);
        }
        if events.is_empty() {
            return Err(ExposureError::NoHazardEvents);
        }

        let mut ordered: Vec<&HazardEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.id);
        ordered.dedup_by(|b, a| {
            let duplicate = a.id == b.id;
            if duplicate {
                log::warn!("Duplicate hazard event {} ignored", b.id);
            }
            duplicate
        });

        log::info!(
            "Aggregating {} exposure for {} events over {} regions",
            self.params.kind,
            ordered.len(),
            regions.len()
        );

        let mut table = ExposureTable::new(self.params.kind, regions);
        let mut processed = Vec::new();
        let mut skipped = Vec::new();
        let mut layers: HashMap<i32, Raster> = HashMap::new();

        for (attempt, event) in ordered.iter().enumerate() {
            if let Some(cooldown) = &self.params.cooldown {
                if cooldown.is_due(attempt) {
                    log::info!("Cooling down for {:?} after {} events", cooldown.pause, attempt);
                    std::thread::sleep(cooldown.pause);
                }
            }

            log::info!("Processing hazard event {} ({} to {})", event.id, event.start_date, event.end_date);

            let outcome = self
                .cached_exposure(&mut layers, exposures, event.year())
                .and_then(|exposure| self.process_event(regions, zones, event, hazards, exposure));

            match outcome {
                Ok(outcome) => {
                    table.record_event(event.id, &outcome.totals, &outcome.exposed)?;
                    processed.push((*event).clone());
                }
                Err(err) => {
                    log::warn!("Skipping hazard event {}: {}", event.id, err);
                    skipped.push(SkippedEvent {
                        event_id: event.id,
                        kind: SkipKind::from_error(&err),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let ids: Vec<EventId> = processed.iter().map(|e: &HazardEvent| e.id).collect();
        table.summarize(&ids);

        log::info!(
            "Aggregation complete: {} events processed, {} skipped",
            processed.len(),
            skipped.len()
        );

        Ok(RunReport {
            table,
            processed,
            skipped,
        })
    }

    /// Align, mask and sum one event against its exposure layer.
    ///
    /// Totals come from the exposure layer on its own grid, so regions only
    /// partly covered by the hazard raster keep their full total.
    pub fn process_event(
        &self,
        regions: &[Region],
        zones: &ZoneRaster,
        event: &HazardEvent,
        hazards: &dyn HazardSource,
        exposure: &Raster,
    ) -> ExposureResult<EventOutcome> {
        let hazard = hazards.load_hazard(event)?;
        let aligned = align(&hazard, exposure)?;
        log::debug!(
            "Event {} aligned on a {}x{} grid at {} resolution",
            event.id,
            aligned.exposure.dim().0,
            aligned.exposure.dim().1,
            aligned.exposure.resolution()
        );

        let totals = zonal_sum(regions, zones, exposure, self.params.unit)?;
        let exposed_raster = mask_by_hazard(&aligned.exposure, &aligned.hazard)?;
        let exposed = zonal_sum_resampled(regions, zones, &exposed_raster, self.params.unit, &exposure.transform)?;

        if let Some(sink) = self.sink {
            if let Err(e) = sink.exposed_raster(event, self.params.kind, &exposed_raster) {
                log::error!("Failed to keep intermediate raster for event {}: {}", event.id, e);
            }
        }

        Ok(EventOutcome { totals, exposed })
    }

    fn cached_exposure<'l>(
        &self,
        layers: &'l mut HashMap<i32, Raster>,
        exposures: &dyn ExposureSource,
        year: i32,
    ) -> ExposureResult<&'l Raster> {
        if !layers.contains_key(&year) {
            let layer = exposures
                .load_exposure(year)?
                .ok_or(ExposureError::MissingExposureLayer(year))?;
            layers.insert(year, layer);
        }
        layers
            .get(&year)
            .ok_or(ExposureError::MissingExposureLayer(year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_schedule() {
        let policy = CooldownPolicy::new(50, Duration::from_secs(900));
        assert!(!policy.is_due(0));
        assert!(!policy.is_due(49));
        assert!(policy.is_due(50));
        assert!(policy.is_due(100));
        assert!(!CooldownPolicy::new(0, Duration::ZERO).is_due(10));
    }

    #[test]
    fn test_skip_kind_classification() {
        let mismatch = ExposureError::ReferenceMismatch {
            hazard: "WGS 84".to_string(),
            exposure: "UTM".to_string(),
        };
        assert_eq!(SkipKind::from_error(&mismatch), SkipKind::ReferenceMismatch);
        let zones = ExposureError::ZoneReferenceMismatch {
            zones: "Lambert_Azim_Mozambique".to_string(),
            raster: "WGS 84".to_string(),
        };
        assert_eq!(SkipKind::from_error(&zones), SkipKind::ReferenceMismatch);
        assert_eq!(
            SkipKind::from_error(&ExposureError::MissingExposureLayer(2021)),
            SkipKind::MissingExposureLayer
        );
        assert_eq!(
            SkipKind::from_error(&ExposureError::Processing("bad".to_string())),
            SkipKind::Failed
        );
    }
}
