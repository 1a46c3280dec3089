//! I/O modules for rasters, event lists, region tables and result export

pub mod raster_io;
pub mod event_catalog;
pub mod exposure_catalog;
pub mod regions;
pub mod table_export;
pub mod workspace;

pub use raster_io::{RasterInfo, RasterReader, RasterWriter};
pub use event_catalog::{EventCatalog, HazardDirectory, HazardNamePattern, DEFAULT_EVENT_PREFIX};
pub use exposure_catalog::ExposureDirectory;
pub use regions::{read_region_table, regions_from_zones, RegionLayer};
pub use table_export::{period_label, write_csv, ColumnNames};
pub use workspace::Workspace;
