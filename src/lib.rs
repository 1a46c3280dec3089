//! floodex: flood exposure statistics per administrative region
//!
//! Overlays a batch of flood event footprints on population or cropland
//! rasters and tabulates, for every region and event, how much of the
//! exposure was flooded, then summarizes each region over all events.

pub mod types;
pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    EventId, ExposureError, ExposureKind, ExposureResult, GeoTransform, HazardEvent, Raster, ReferenceSystem,
    Region, RegionId, ZoneRaster, NO_ZONE,
};

pub use config::ExposureConfig;
pub use core::{ExposureAggregator, ExposureTable, RunReport};
pub use io::{EventCatalog, RasterReader, RasterWriter};
pub use pipeline::{run_pipeline, PipelineOutput};
