//! Run configuration loaded from a TOML file.
//!
//! ```toml
//! [regions]
//! table = "moz_admin3.csv"
//! zones = "moz_admin3_zones.tif"
//! id_column = "OBJECTID"
//! name_column = "Posto"
//!
//! [hazard]
//! directory = "flood_layers"
//! prefix = "DFO"
//! since = "2008-01-01"
//!
//! [exposure]
//! kind = "population"
//! directory = "worldpop"
//! pattern = "moz_ppp_{year}.tif"
//!
//! [output]
//! table = "results/adm3_pop_flooded_stats.csv"
//! period = "2008_2020"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use crate::core::aggregator::{AggregatorParams, CooldownPolicy};
use crate::core::zonal::ValueUnit;
use crate::io::event_catalog::DEFAULT_EVENT_PREFIX;
use crate::io::exposure_catalog::YEAR_PLACEHOLDER;
use crate::types::{ExposureError, ExposureKind, ExposureResult};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ExposureConfig {
    pub regions: RegionsConfig,
    pub hazard: HazardConfig,
    pub exposure: ExposureLayerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionsConfig {
    /// CSV attribute table; regions are taken from the zone raster when absent
    pub table: Option<PathBuf>,
    /// Rasterized regions (one id per pixel, 0 = outside)
    pub zones: PathBuf,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
}

fn default_id_column() -> String {
    "OBJECTID".to_string()
}

fn default_name_column() -> String {
    "Posto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HazardConfig {
    /// Directory with one footprint raster per event
    pub directory: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Band holding the "flooded" layer
    #[serde(default = "default_band")]
    pub band: isize,
    /// Recode the band to 1 = flooded, everything else no-data
    #[serde(default)]
    pub reclassify: bool,
    /// Event list CSV (ID, BEGAN, ENDED, MAINCAUSE); restricts and labels events
    pub events: Option<PathBuf>,
    /// Only events starting on or after this date ("YYYY-MM-DD")
    pub since: Option<NaiveDate>,
}

fn default_prefix() -> String {
    DEFAULT_EVENT_PREFIX.to_string()
}

fn default_band() -> isize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExposureLayerConfig {
    pub kind: ExposureKind,
    pub directory: PathBuf,
    /// File name with a `{year}` placeholder
    pub pattern: String,
    #[serde(default = "default_band")]
    pub band: isize,
    /// Class codes remapped to a binary indicator on load (e.g. [25, 35, 36])
    pub remap_codes: Option<Vec<u16>>,
    /// Area of one exposure layer pixel as published, in m2; taken from a
    /// projected grid when absent
    pub pixel_area_m2: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// CSV output path
    pub table: PathBuf,
    /// Period label for summary columns; derived from event years when absent
    pub period: Option<String>,
    /// Keep each event's exposed raster in this directory
    pub intermediates: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Pause after this many events
    pub cooldown_every: Option<usize>,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            cooldown_every: None,
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    900
}

impl ExposureConfig {
    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> ExposureResult<Self> {
        log::info!("Loading configuration from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        let base_dir = path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_toml_str(&text, base_dir)
    }

    /// Parse and validate TOML text, resolving paths against `base_dir`
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> ExposureResult<Self> {
        let mut config: ExposureConfig = toml::from_str(text)?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExposureResult<()> {
        if self.hazard.prefix.is_empty() || !self.hazard.prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ExposureError::Config(format!(
                "hazard.prefix must be alphanumeric, got {:?}",
                self.hazard.prefix
            )));
        }
        if self.hazard.band < 1 || self.exposure.band < 1 {
            return Err(ExposureError::Config("Band indices start at 1".to_string()));
        }
        if !self.exposure.pattern.contains(YEAR_PLACEHOLDER) {
            return Err(ExposureError::Config(format!(
                "exposure.pattern must contain {}",
                YEAR_PLACEHOLDER
            )));
        }
        if let Some(area) = self.exposure.pixel_area_m2 {
            if !(area > 0.0) {
                return Err(ExposureError::Config("exposure.pixel_area_m2 must be positive".to_string()));
            }
        }
        if self.exposure.kind == ExposureKind::Population && self.exposure.pixel_area_m2.is_some() {
            log::warn!("exposure.pixel_area_m2 is ignored for population counts");
        }
        if let Some(codes) = &self.exposure.remap_codes {
            if codes.is_empty() {
                return Err(ExposureError::Config("exposure.remap_codes is empty".to_string()));
            }
        }
        if self.processing.cooldown_every == Some(0) {
            return Err(ExposureError::Config("processing.cooldown_every must be > 0".to_string()));
        }
        if let Some(period) = &self.output.period {
            if period.trim().is_empty() {
                return Err(ExposureError::Config("output.period is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Resolve a configured path against the config directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn value_unit(&self) -> ValueUnit {
        match self.exposure.kind {
            ExposureKind::Population => ValueUnit::Count,
            ExposureKind::Cropland => ValueUnit::Hectares {
                pixel_area_m2: self.exposure.pixel_area_m2,
            },
        }
    }

    pub fn cooldown(&self) -> Option<CooldownPolicy> {
        self.processing
            .cooldown_every
            .map(|every| CooldownPolicy::new(every, Duration::from_secs(self.processing.cooldown_secs)))
    }

    pub fn aggregator_params(&self) -> AggregatorParams {
        AggregatorParams {
            kind: self.exposure.kind,
            unit: self.value_unit(),
            cooldown: self.cooldown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CROPLAND: &str = r#"
[regions]
zones = "zones/admin3.tif"

[hazard]
directory = "/data/flood"
since = "2018-01-14"

[exposure]
kind = "cropland"
directory = "landcover"
pattern = "MODIS_Land_Cover_{year}.tif"
remap_codes = [25, 35, 36]

[output]
table = "results/adm3_crop_flooded_table.csv"

[processing]
cooldown_every = 50
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ExposureConfig::from_toml_str(CROPLAND, "/work").unwrap();

        assert_eq!(config.regions.id_column, "OBJECTID");
        assert_eq!(config.regions.name_column, "Posto");
        assert_eq!(config.hazard.prefix, "DFO");
        assert_eq!(config.hazard.band, 1);
        assert_eq!(config.hazard.since, NaiveDate::from_ymd_opt(2018, 1, 14));
        assert_eq!(config.exposure.kind, ExposureKind::Cropland);
        assert_eq!(config.exposure.remap_codes, Some(vec![25, 35, 36]));
        assert_eq!(config.value_unit(), ValueUnit::Hectares { pixel_area_m2: None });

        let cooldown = config.cooldown().unwrap();
        assert_eq!(cooldown.every, 50);
        assert_eq!(cooldown.pause, Duration::from_secs(900));

        assert_eq!(config.resolve(&config.regions.zones), PathBuf::from("/work/zones/admin3.tif"));
        assert_eq!(config.resolve(&config.hazard.directory), PathBuf::from("/data/flood"));
    }

    #[test]
    fn test_rejects_pattern_without_year() {
        let text = CROPLAND.replace("MODIS_Land_Cover_{year}.tif", "landcover.tif");
        assert!(matches!(
            ExposureConfig::from_toml_str(&text, "/work"),
            Err(ExposureError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_zero_cooldown_and_bad_prefix() {
        let text = CROPLAND.replace("cooldown_every = 50", "cooldown_every = 0");
        assert!(ExposureConfig::from_toml_str(&text, "/work").is_err());

        let text = CROPLAND.replace("since = \"2018-01-14\"", "prefix = \"DFO.*\"");
        assert!(ExposureConfig::from_toml_str(&text, "/work").is_err());
    }

    #[test]
    fn test_missing_section_is_a_toml_error() {
        let text = CROPLAND.replace("[output]\ntable = \"results/adm3_crop_flooded_table.csv\"\n", "");
        assert!(matches!(
            ExposureConfig::from_toml_str(&text, "/work"),
            Err(ExposureError::Toml(_))
        ));
    }
}
