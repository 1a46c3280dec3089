use crate::core::aggregator::IntermediateSink;
use crate::io::raster_io::RasterWriter;
use crate::types::{ExposureKind, ExposureResult, HazardEvent, Raster};
use std::path::{Path, PathBuf};

/// Directory where exposed rasters are kept after a run
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Workspace in `dir`, created if missing
    pub fn create<P: AsRef<Path>>(dir: P) -> ExposureResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        log::debug!("Keeping intermediates in {}", dir.as_ref().display());
        Ok(Self {
            root: dir.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// File name of the exposed raster kept for an event
    pub fn exposed_raster_path(&self, event: &HazardEvent, kind: ExposureKind) -> PathBuf {
        self.root.join(format!("{}_exposed_event_{}.tif", kind, event.id))
    }
}

impl IntermediateSink for Workspace {
    fn exposed_raster(&self, event: &HazardEvent, kind: ExposureKind, raster: &Raster) -> ExposureResult<()> {
        RasterWriter::write_raster(raster, self.exposed_raster_path(event, kind))
    }
}
