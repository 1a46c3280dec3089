use crate::core::reclassify::remap_codes;
use crate::core::sources::ExposureSource;
use crate::io::raster_io::RasterReader;
use crate::types::{ExposureError, ExposureResult, Raster};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Placeholder replaced by the four-digit year in exposure file patterns
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// One exposure raster per calendar year in a directory, e.g. `moz_ppp_{year}.tif`
#[derive(Debug, Clone)]
pub struct ExposureDirectory {
    dir: PathBuf,
    pattern: String,
    band: isize,
    /// Class codes remapped to a binary indicator on load
    remap: Option<Vec<u16>>,
}

impl ExposureDirectory {
    pub fn new<P: AsRef<Path>>(dir: P, pattern: &str) -> ExposureResult<Self> {
        if !pattern.contains(YEAR_PLACEHOLDER) {
            return Err(ExposureError::Config(format!(
                "Exposure pattern {:?} has no {} placeholder",
                pattern, YEAR_PLACEHOLDER
            )));
        }
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            pattern: pattern.to_string(),
            band: 1,
            remap: None,
        })
    }

    pub fn with_band(mut self, band: isize) -> Self {
        self.band = band;
        self
    }

    pub fn with_remap(mut self, codes: Vec<u16>) -> Self {
        self.remap = Some(codes);
        self
    }

    /// File expected for a given year
    pub fn path_for(&self, year: i32) -> PathBuf {
        self.dir.join(self.pattern.replace(YEAR_PLACEHOLDER, &format!("{:04}", year)))
    }

    /// Years with a matching file in the directory, ascending
    pub fn available_years(&self) -> ExposureResult<Vec<i32>> {
        let (head, tail) = self
            .pattern
            .split_once(YEAR_PLACEHOLDER)
            .unwrap_or((self.pattern.as_str(), ""));
        let regex = Regex::new(&format!("^{}(\\d{{4}}){}$", regex::escape(head), regex::escape(tail)))
            .map_err(|e| ExposureError::Config(format!("Invalid exposure pattern: {}", e)))?;

        let mut years: Vec<i32> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                regex.captures(&name)?[1].parse().ok()
            })
            .collect();
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }
}

impl ExposureSource for ExposureDirectory {
    fn load_exposure(&self, year: i32) -> ExposureResult<Option<Raster>> {
        let path = self.path_for(year);
        if !path.exists() {
            log::debug!("No exposure layer at {}", path.display());
            return Ok(None);
        }

        let raster = RasterReader::read_raster(&path, self.band)?;
        Ok(Some(match &self.remap {
            Some(codes) => remap_codes(&raster, codes),
            None => raster,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pattern_requires_year() {
        assert!(ExposureDirectory::new("/data", "moz_ppp.tif").is_err());
        let dir = ExposureDirectory::new("/data", "moz_ppp_{year}.tif").unwrap();
        assert_eq!(dir.path_for(2019), PathBuf::from("/data/moz_ppp_2019.tif"));
    }

    #[test]
    fn test_available_years_and_missing_layer() {
        let tmp = TempDir::new().unwrap();
        for name in ["moz_ppp_2019.tif", "moz_ppp_2015.tif", "moz_ppp_2019.tif.aux.xml", "readme.txt"] {
            std::fs::write(tmp.path().join(name), b"").unwrap();
        }

        let dir = ExposureDirectory::new(tmp.path(), "moz_ppp_{year}.tif").unwrap();
        assert_eq!(dir.available_years().unwrap(), vec![2015, 2019]);
        assert!(dir.load_exposure(2021).unwrap().is_none());
    }
}
