use crate::io::raster_io::RasterReader;
use crate::types::{ExposureError, ExposureResult, Region, RegionId, ZoneRaster, NO_ZONE};
use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

/// Administrative units and their rasterized footprint
#[derive(Debug, Clone)]
pub struct RegionLayer {
    pub regions: Vec<Region>,
    pub zones: ZoneRaster,
}

impl RegionLayer {
    /// Load the attribute table and the zone raster.
    ///
    /// Without a table, regions are derived from the ids present in the zone
    /// raster and carry empty names.
    pub fn load<P: AsRef<Path>>(
        table: Option<&Path>,
        zones: P,
        id_column: &str,
        name_column: &str,
    ) -> ExposureResult<Self> {
        let zones = RasterReader::read_zones(zones)?;
        let regions = match table {
            Some(path) => read_region_table(path, id_column, name_column)?,
            None => regions_from_zones(&zones),
        };

        let known: HashSet<RegionId> = regions.iter().map(|r| r.id).collect();
        let orphan_zones = distinct_zone_ids(&zones)
            .into_iter()
            .filter(|id| !known.contains(id))
            .count();
        if orphan_zones > 0 {
            log::warn!("{} zone ids have no row in the region table", orphan_zones);
        }

        log::info!("Loaded {} regions", regions.len());
        Ok(Self { regions, zones })
    }
}

/// Read regions from a CSV attribute table
pub fn read_region_table<P: AsRef<Path>>(path: P, id_column: &str, name_column: &str) -> ExposureResult<Vec<Region>> {
    log::info!("Reading region table from: {}", path.as_ref().display());
    let file = std::fs::File::open(path.as_ref())?;
    parse_region_table(file, id_column, name_column)
}

pub fn parse_region_table<R: Read>(reader: R, id_column: &str, name_column: &str) -> ExposureResult<Vec<Region>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ExposureError::InvalidFormat(format!("Region table has no column {:?}", name)))
    };
    let id_idx = column(id_column)?;
    let name_idx = column(name_column).ok();
    if name_idx.is_none() {
        log::warn!("Region table has no {:?} column, names left empty", name_column);
    }

    let mut seen = HashSet::new();
    let mut regions = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let raw_id = record.get(id_idx).unwrap_or_default();
        let id: RegionId = raw_id
            .parse()
            .map_err(|_| ExposureError::InvalidFormat(format!("Invalid region id {:?}", raw_id)))?;
        if id == NO_ZONE {
            return Err(ExposureError::InvalidFormat("Region id 0 is reserved for no-data".to_string()));
        }
        if !seen.insert(id) {
            return Err(ExposureError::InvalidFormat(format!("Duplicate region id {}", id)));
        }
        let name = name_idx.and_then(|i| record.get(i)).unwrap_or_default();
        regions.push(Region::new(id, name));
    }

    Ok(regions)
}

/// One unnamed region per distinct zone id
pub fn regions_from_zones(zones: &ZoneRaster) -> Vec<Region> {
    distinct_zone_ids(zones)
        .into_iter()
        .map(|id| Region::new(id, ""))
        .collect()
}

fn distinct_zone_ids(zones: &ZoneRaster) -> BTreeSet<RegionId> {
    zones.ids.iter().copied().filter(|id| *id != NO_ZONE).collect()
}
