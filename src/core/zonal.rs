use crate::core::exposure_table::round_half_even;
use crate::types::{ExposureError, ExposureResult, GeoTransform, Raster, Region, RegionId, ZoneRaster, NO_ZONE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Square metres per hectare
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// How summed pixel values are reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValueUnit {
    /// Pixel values are counts (people); the sum is rounded to an integer
    Count,
    /// Pixel values are an area indicator; the sum is converted to hectares.
    /// `pixel_area_m2` is the area of one pixel of the exposure layer as
    /// published; without it the area comes from a projected geotransform.
    Hectares { pixel_area_m2: Option<f64> },
}

impl ValueUnit {
    /// Reported amount carried by one pixel value of `raster`.
    ///
    /// `native` is the grid the exposure layer was read on. When `raster` was
    /// resampled onto a finer grid, a native pixel is shared between the finer
    /// pixels it covers.
    pub fn pixel_factor(&self, raster: &Raster, native: &GeoTransform) -> ExposureResult<f64> {
        let native_area = native.pixel_area();
        if !(native_area > 0.0) || !native_area.is_finite() {
            return Err(ExposureError::InvalidFormat(format!(
                "Exposure grid has a degenerate pixel area: {}",
                native_area
            )));
        }
        let share = raster.transform.pixel_area() / native_area;

        match self {
            ValueUnit::Count => Ok(share),
            ValueUnit::Hectares {
                pixel_area_m2: Some(area),
            } => Ok(area * share / M2_PER_HECTARE),
            ValueUnit::Hectares { pixel_area_m2: None } => {
                if raster.reference.is_geographic() {
                    return Err(ExposureError::Config(format!(
                        "Pixel area of a geographic grid ({}) is not in square metres; \
                         set exposure.pixel_area_m2 or use a projected layer",
                        raster.reference.label()
                    )));
                }
                Ok(raster.transform.pixel_area() / M2_PER_HECTARE)
            }
        }
    }
}

/// Sum the defined pixels of `raster` per region.
///
/// Every region in `regions` appears in the result; regions without any
/// defined pixel report 0. No-data pixels are excluded, not counted as zero.
pub fn zonal_sum(
    regions: &[Region],
    zones: &ZoneRaster,
    raster: &Raster,
    unit: ValueUnit,
) -> ExposureResult<BTreeMap<RegionId, f64>> {
    zonal_sum_resampled(regions, zones, raster, unit, &raster.transform)
}

/// Like [`zonal_sum`] for a raster resampled from an exposure layer on `native`
pub fn zonal_sum_resampled(
    regions: &[Region],
    zones: &ZoneRaster,
    raster: &Raster,
    unit: ValueUnit,
    native: &GeoTransform,
) -> ExposureResult<BTreeMap<RegionId, f64>> {
    if zones.reference.is_defined()
        && raster.reference.is_defined()
        && !zones.reference.matches(&raster.reference)
    {
        return Err(ExposureError::ZoneReferenceMismatch {
            zones: zones.reference.label(),
            raster: raster.reference.label(),
        });
    }
    if zones.transform.is_rotated() || raster.transform.is_rotated() {
        return Err(ExposureError::InvalidFormat(
            "Rotated geotransforms are not supported".to_string(),
        ));
    }

    let factor = unit.pixel_factor(raster, native)?;
    let lookup = ZoneLookup::new(zones, raster);
    let sums = accumulate(&lookup, zones, raster);

    let mut result = BTreeMap::new();
    for region in regions {
        let raw = sums.get(&region.id).copied().unwrap_or(0.0);
        result.insert(region.id, round_half_even(raw * factor));
    }

    log::debug!(
        "Zonal sum over {} regions ({} with data)",
        regions.len(),
        regions.iter().filter(|r| sums.contains_key(&r.id)).count()
    );

    Ok(result)
}

/// Precomputed raster-pixel -> zone-pixel index maps
struct ZoneLookup {
    rows: Vec<Option<usize>>,
    cols: Vec<Option<usize>>,
}

impl ZoneLookup {
    fn new(zones: &ZoneRaster, raster: &Raster) -> Self {
        let (rows, cols) = raster.dim();
        let (zone_rows, zone_cols) = zones.ids.dim();
        let zt = &zones.transform;

        let cols = (0..cols)
            .map(|col| {
                let (x, _) = raster.transform.pixel_center(0, col);
                zt.column_of(x, zone_cols)
            })
            .collect();
        let rows = (0..rows)
            .map(|row| {
                let (_, y) = raster.transform.pixel_center(row, 0);
                zt.row_of(y, zone_rows)
            })
            .collect();

        Self { rows, cols }
    }
}

fn accumulate_row(
    lookup: &ZoneLookup,
    zones: &ZoneRaster,
    raster: &Raster,
    row: usize,
    acc: &mut HashMap<RegionId, f64>,
) {
    let Some(zone_row) = lookup.rows[row] else { return };
    for (col, zone_col) in lookup.cols.iter().enumerate() {
        let Some(zone_col) = zone_col else { continue };
        let value = raster.data[[row, col]];
        if value.is_nan() {
            continue;
        }
        let zone = zones.ids[[zone_row, *zone_col]];
        if zone == NO_ZONE {
            continue;
        }
        *acc.entry(zone).or_insert(0.0) += value as f64;
    }
}

#[cfg(feature = "parallel")]
fn accumulate(lookup: &ZoneLookup, zones: &ZoneRaster, raster: &Raster) -> HashMap<RegionId, f64> {
    use rayon::prelude::*;

    (0..raster.dim().0)
        .into_par_iter()
        .fold(HashMap::new, |mut acc, row| {
            accumulate_row(lookup, zones, raster, row, &mut acc);
            acc
        })
        .reduce(HashMap::new, |mut left, right| {
            for (zone, value) in right {
                *left.entry(zone).or_insert(0.0) += value;
            }
            left
        })
}

#[cfg(not(feature = "parallel"))]
fn accumulate(lookup: &ZoneLookup, zones: &ZoneRaster, raster: &Raster) -> HashMap<RegionId, f64> {
    let mut acc = HashMap::new();
    for row in 0..raster.dim().0 {
        accumulate_row(lookup, zones, raster, row, &mut acc);
    }
    acc
}
