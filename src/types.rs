use chrono::{Datelike, NaiveDate};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Administrative unit identifier (OBJECTID of the region table)
pub type RegionId = u32;

/// Flood event identifier (always > 0)
pub type EventId = u32;

/// Zone id used in the rasterized region layer for pixels outside every region
pub const NO_ZONE: RegionId = 0;

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Mean cell width in map units
    pub fn resolution(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Area covered by one pixel in squared map units
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation_x != 0.0 || self.rotation_y != 0.0
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.top_left_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.top_left_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Column containing map x on a grid `cols` wide
    pub fn column_of(&self, x: f64, cols: usize) -> Option<usize> {
        axis_index(x, self.top_left_x, self.pixel_width, cols)
    }

    /// Row containing map y on a grid `rows` high
    pub fn row_of(&self, y: f64, rows: usize) -> Option<usize> {
        axis_index(y, self.top_left_y, self.pixel_height, rows)
    }
}

fn axis_index(coord: f64, origin: f64, step: f64, len: usize) -> Option<usize> {
    let idx = ((coord - origin) / step).floor();
    (idx.is_finite() && idx >= 0.0 && idx < len as f64).then_some(idx as usize)
}

/// Coordinate reference system carried by a raster, kept as WKT
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSystem {
    wkt: String,
}

impl ReferenceSystem {
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self { wkt: wkt.into() }
    }

    /// Reference system with no definition (e.g. a GeoTIFF without projection)
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn is_defined(&self) -> bool {
        !self.wkt.trim().is_empty()
    }

    /// Root name of the WKT, e.g. `WGS 84` for `GEOGCS["WGS 84",...]`
    pub fn name(&self) -> Option<&str> {
        let start = self.wkt.find('[')?;
        let rest = self.wkt[start + 1..].trim_start().strip_prefix('"')?;
        let end = rest.find('"')?;
        Some(&rest[..end])
    }

    /// Geographic (angular) coordinates, e.g. `GEOGCS[...]` or `GEOGCRS[...]`
    pub fn is_geographic(&self) -> bool {
        let wkt = self.wkt.trim_start();
        ["GEOGCS", "GEOGCRS", "GEOGRAPHICCRS"]
            .iter()
            .any(|root| wkt.starts_with(root))
    }

    /// Display label used in diagnostics
    pub fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None if self.is_defined() => "<unnamed>".to_string(),
            None => "<undefined>".to_string(),
        }
    }

    /// Two reference systems match when both are defined and share the same name
    pub fn matches(&self, other: &ReferenceSystem) -> bool {
        if !self.is_defined() || !other.is_defined() {
            return false;
        }
        match (self.name(), other.name()) {
            (Some(a), Some(b)) => a == b,
            _ => self.wkt.trim() == other.wkt.trim(),
        }
    }
}

/// Single-band raster with NaN as no-data
#[derive(Debug, Clone)]
pub struct Raster {
    pub data: Array2<f32>,
    pub transform: GeoTransform,
    pub reference: ReferenceSystem,
}

impl Raster {
    pub fn new(data: Array2<f32>, transform: GeoTransform, reference: ReferenceSystem) -> Self {
        Self {
            data,
            transform,
            reference,
        }
    }

    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn resolution(&self) -> f64 {
        self.transform.resolution()
    }

    pub fn defined_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// True when both rasters sit on exactly the same pixel grid
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.dim() == other.dim() && self.transform == other.transform
    }
}

/// Rasterized administrative units: each pixel holds the id of the region covering it
#[derive(Debug, Clone)]
pub struct ZoneRaster {
    pub ids: Array2<RegionId>,
    pub transform: GeoTransform,
    pub reference: ReferenceSystem,
}

impl ZoneRaster {
    pub fn new(ids: Array2<RegionId>, transform: GeoTransform, reference: ReferenceSystem) -> Self {
        Self {
            ids,
            transform,
            reference,
        }
    }
}

/// Administrative unit (posto)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
}

impl Region {
    pub fn new(id: RegionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One flood occurrence with its footprint raster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub id: EventId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cause: Option<String>,
    /// Footprint raster on disk, when the event was discovered from a directory
    pub source: Option<PathBuf>,
}

impl HazardEvent {
    pub fn new(id: EventId, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id,
            start_date,
            end_date,
            cause: None,
            source: None,
        }
    }

    /// Calendar year used to pick the matching exposure layer
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }
}

/// What the exposure raster measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureKind {
    /// Population counts per pixel
    Population,
    /// Binary cropland indicator per pixel
    Cropland,
}

impl std::fmt::Display for ExposureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExposureKind::Population => write!(f, "population"),
            ExposureKind::Cropland => write!(f, "cropland"),
        }
    }
}

/// Error types for exposure processing
#[derive(Debug, thiserror::Error)]
pub enum ExposureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reference system mismatch: hazard {hazard} vs exposure {exposure}")]
    ReferenceMismatch { hazard: String, exposure: String },

    #[error("Reference system mismatch: zones {zones} vs raster {raster}")]
    ZoneReferenceMismatch { zones: String, raster: String },

    #[error("Undefined reference system: {0}")]
    UndefinedReference(String),

    #[error("No exposure layer for year {0}")]
    MissingExposureLayer(i32),

    #[error("Region set is empty")]
    EmptyRegions,

    #[error("No hazard events to process")]
    NoHazardEvents,

    #[error("Unknown region id {0}")]
    UnknownRegion(RegionId),
}

/// Result type for exposure operations
pub type ExposureResult<T> = Result<T, ExposureError>;
