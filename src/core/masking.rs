use crate::types::{ExposureError, ExposureResult, Raster};
use ndarray::{ArrayView2, Zip};

/// Restrict an exposure raster to the hazard footprint.
///
/// Output equals `exposure` where the hazard pixel is defined and non-zero,
/// and no-data everywhere else. Both rasters must already be co-registered.
pub fn mask_by_hazard(exposure: &Raster, hazard: &Raster) -> ExposureResult<Raster> {
    if exposure.dim() != hazard.dim() {
        return Err(ExposureError::Processing(format!(
            "Rasters are not co-registered: exposure {:?} vs hazard {:?}",
            exposure.dim(),
            hazard.dim()
        )));
    }

    let masked = mask_array(exposure.data.view(), hazard.data.view());

    log::debug!(
        "Masked exposure by hazard footprint: {} of {} pixels retained",
        masked.iter().filter(|v| !v.is_nan()).count(),
        masked.len()
    );

    Ok(Raster::new(masked, exposure.transform, exposure.reference.clone()))
}

/// Hazard footprint test for a single pixel
#[inline]
pub fn is_flooded(value: f32) -> bool {
    !value.is_nan() && value != 0.0
}

#[cfg(feature = "parallel")]
pub(crate) fn mask_array(exposure: ArrayView2<f32>, hazard: ArrayView2<f32>) -> ndarray::Array2<f32> {
    Zip::from(exposure)
        .and(hazard)
        .par_map_collect(|&value, &flood| if is_flooded(flood) { value } else { f32::NAN })
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn mask_array(exposure: ArrayView2<f32>, hazard: ArrayView2<f32>) -> ndarray::Array2<f32> {
    Zip::from(exposure)
        .and(hazard)
        .map_collect(|&value, &flood| if is_flooded(flood) { value } else { f32::NAN })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, ReferenceSystem};
    use ndarray::Array2;

    fn raster(values: Vec<f32>) -> Raster {
        Raster::new(
            Array2::from_shape_vec((2, 3), values).unwrap(),
            GeoTransform::north_up(0.0, 2.0, 1.0),
            ReferenceSystem::from_wkt(r#"GEOGCS["WGS 84"]"#),
        )
    }

    #[test]
    fn test_mask_keeps_only_flooded_pixels() {
        let exposure = raster(vec![10.0, 20.0, 30.0, 40.0, f32::NAN, 60.0]);
        let hazard = raster(vec![1.0, 0.0, f32::NAN, 1.0, 1.0, 2.0]);

        let masked = mask_by_hazard(&exposure, &hazard).unwrap();
        let values: Vec<f32> = masked.data.iter().cloned().collect();

        assert_eq!(values[0], 10.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
        assert_eq!(values[3], 40.0);
        assert!(values[4].is_nan());
        assert_eq!(values[5], 60.0);
        assert_eq!(masked.transform, exposure.transform);
    }

    #[test]
    fn test_mask_rejects_mismatched_shapes() {
        let exposure = raster(vec![1.0; 6]);
        let hazard = Raster::new(
            Array2::from_elem((3, 2), 1.0),
            GeoTransform::north_up(0.0, 3.0, 1.0),
            ReferenceSystem::from_wkt(r#"GEOGCS["WGS 84"]"#),
        );
        assert!(mask_by_hazard(&exposure, &hazard).is_err());
    }
}
