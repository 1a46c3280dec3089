use crate::types::{ExposureError, ExposureResult, Raster};
use ndarray::Array2;

/// Hazard and exposure rasters on one common pixel grid
#[derive(Debug, Clone)]
pub struct AlignedPair {
    pub hazard: Raster,
    pub exposure: Raster,
}

/// Which input provided the common grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetGrid {
    Hazard,
    Exposure,
}

/// Bring a hazard raster and an exposure raster onto a common grid.
///
/// Both rasters must declare the same reference system. The coarser raster is
/// resampled onto the grid of the finer one using nearest neighbour, so binary
/// footprints and class-coded layers keep their values. On equal resolution the
/// exposure grid is kept.
pub fn align(hazard: &Raster, exposure: &Raster) -> ExposureResult<AlignedPair> {
    if !hazard.reference.is_defined() {
        return Err(ExposureError::UndefinedReference("hazard raster".to_string()));
    }
    if !exposure.reference.is_defined() {
        return Err(ExposureError::UndefinedReference("exposure raster".to_string()));
    }
    if !hazard.reference.matches(&exposure.reference) {
        return Err(ExposureError::ReferenceMismatch {
            hazard: hazard.reference.label(),
            exposure: exposure.reference.label(),
        });
    }
    if hazard.transform.is_rotated() || exposure.transform.is_rotated() {
        return Err(ExposureError::InvalidFormat(
            "Rotated geotransforms are not supported".to_string(),
        ));
    }

    if hazard.same_grid(exposure) {
        log::debug!("Hazard and exposure already share a {}x{} grid", hazard.dim().0, hazard.dim().1);
        return Ok(AlignedPair {
            hazard: hazard.clone(),
            exposure: exposure.clone(),
        });
    }

    let target = select_target(hazard, exposure);
    log::debug!(
        "Aligning grids: hazard {} vs exposure {} resolution, target = {:?}",
        hazard.resolution(),
        exposure.resolution(),
        target
    );

    let pair = match target {
        TargetGrid::Exposure => AlignedPair {
            hazard: resample_nearest(hazard, exposure),
            exposure: exposure.clone(),
        },
        TargetGrid::Hazard => AlignedPair {
            hazard: hazard.clone(),
            exposure: resample_nearest(exposure, hazard),
        },
    };

    Ok(pair)
}

/// The finer of the two grids; exposure wins ties
pub fn select_target(hazard: &Raster, exposure: &Raster) -> TargetGrid {
    if hazard.resolution() < exposure.resolution() {
        TargetGrid::Hazard
    } else {
        TargetGrid::Exposure
    }
}

/// Resample `source` onto the pixel grid of `template` with nearest neighbour.
///
/// Target pixels whose centre falls outside the source extent become no-data.
pub fn resample_nearest(source: &Raster, template: &Raster) -> Raster {
    let (rows, cols) = template.dim();
    let src_dim = source.dim();
    let mut resampled = Array2::from_elem((rows, cols), f32::NAN);

    // Without rotation, columns and rows map independently
    let col_map: Vec<Option<usize>> = (0..cols)
        .map(|col| {
            let (x, _) = template.transform.pixel_center(0, col);
            source.transform.column_of(x, src_dim.1)
        })
        .collect();
    let row_map: Vec<Option<usize>> = (0..rows)
        .map(|row| {
            let (_, y) = template.transform.pixel_center(row, 0);
            source.transform.row_of(y, src_dim.0)
        })
        .collect();

    for (row, src_row) in row_map.iter().enumerate() {
        let Some(src_row) = src_row else { continue };
        for (col, src_col) in col_map.iter().enumerate() {
            if let Some(src_col) = src_col {
                resampled[[row, col]] = source.data[[*src_row, *src_col]];
            }
        }
    }

    log::debug!(
        "Resampled {}x{} -> {}x{} (nearest neighbour)",
        src_dim.0,
        src_dim.1,
        rows,
        cols
    );

    Raster::new(resampled, template.transform, source.reference.clone())
}
