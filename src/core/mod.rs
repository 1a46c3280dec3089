//! Core exposure processing modules

pub mod align;
pub mod masking;
pub mod zonal;
pub mod exposure_table;
pub mod reclassify;
pub mod sources;
pub mod aggregator;

// Re-export main types
pub use align::{align, resample_nearest, AlignedPair, TargetGrid};
pub use masking::{mask_by_hazard, is_flooded};
pub use zonal::{zonal_sum, zonal_sum_resampled, ValueUnit, M2_PER_HECTARE};
pub use exposure_table::{
    percentage_exposed, round_half_even, round_to, EventStat, ExposureTable, RegionRecord, RegionSummary,
};
pub use reclassify::{flood_footprint, remap_codes, LCCS2_CROPLAND_CODES};
pub use sources::{ExposureSource, HazardSource, InMemoryExposure, InMemoryHazards};
pub use aggregator::{
    AggregatorParams, CooldownPolicy, EventOutcome, ExposureAggregator, IntermediateSink, RunReport, SkipKind,
    SkippedEvent,
};
