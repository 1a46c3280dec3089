use crate::types::{EventId, ExposureError, ExposureResult, HazardEvent, Raster};
use std::collections::{BTreeMap, HashMap};

/// Provides the footprint raster of a hazard event
pub trait HazardSource {
    fn load_hazard(&self, event: &HazardEvent) -> ExposureResult<Raster>;
}

/// Provides the exposure raster for a calendar year.
///
/// `Ok(None)` means no layer exists for that year.
pub trait ExposureSource {
    fn load_exposure(&self, year: i32) -> ExposureResult<Option<Raster>>;
}

/// Hazard rasters held in memory, keyed by event id
#[derive(Debug, Clone, Default)]
pub struct InMemoryHazards {
    rasters: HashMap<EventId, Raster>,
}

impl InMemoryHazards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event_id: EventId, raster: Raster) {
        self.rasters.insert(event_id, raster);
    }

    pub fn with(mut self, event_id: EventId, raster: Raster) -> Self {
        self.insert(event_id, raster);
        self
    }
}

impl HazardSource for InMemoryHazards {
    fn load_hazard(&self, event: &HazardEvent) -> ExposureResult<Raster> {
        self.rasters.get(&event.id).cloned().ok_or_else(|| {
            ExposureError::Processing(format!("No hazard raster for event {}", event.id))
        })
    }
}

/// Exposure rasters held in memory, keyed by year
#[derive(Debug, Clone, Default)]
pub struct InMemoryExposure {
    layers: BTreeMap<i32, Raster>,
}

impl InMemoryExposure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, raster: Raster) {
        self.layers.insert(year, raster);
    }

    pub fn with(mut self, year: i32, raster: Raster) -> Self {
        self.insert(year, raster);
        self
    }

    pub fn years(&self) -> Vec<i32> {
        self.layers.keys().copied().collect()
    }
}

impl ExposureSource for InMemoryExposure {
    fn load_exposure(&self, year: i32) -> ExposureResult<Option<Raster>> {
        Ok(self.layers.get(&year).cloned())
    }
}
