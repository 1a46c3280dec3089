use crate::types::Raster;

/// FAO-LCCS2 land-use classes counted as cropland:
/// 25 forest/cropland mosaics, 35 natural herbaceous/cropland mosaics,
/// 36 herbaceous croplands
pub const LCCS2_CROPLAND_CODES: [u16; 3] = [25, 35, 36];

/// Value marking a flooded pixel in the detection output band
pub const FLOODED_VALUE: f32 = 1.0;

/// Turn the "flooded" band of a detection product into a footprint mask.
///
/// Flooded pixels keep value 1; everything else becomes no-data so the
/// result can be used directly as a mask.
pub fn flood_footprint(flood_band: &Raster) -> Raster {
    let data = flood_band
        .data
        .mapv(|v| if v == FLOODED_VALUE { FLOODED_VALUE } else { f32::NAN });

    log::debug!(
        "Flood footprint: {} flooded pixels of {}",
        data.iter().filter(|v| !v.is_nan()).count(),
        data.len()
    );

    Raster::new(data, flood_band.transform, flood_band.reference.clone())
}

/// Remap class codes to a binary indicator.
///
/// Pixels whose class is in `codes` become 1, every other pixel becomes no-data.
pub fn remap_codes(classes: &Raster, codes: &[u16]) -> Raster {
    let data = classes.data.mapv(|v| {
        if v.is_nan() || v < 0.0 || v.fract() != 0.0 {
            return f32::NAN;
        }
        if codes.iter().any(|&code| code as f32 == v) {
            1.0
        } else {
            f32::NAN
        }
    });

    log::debug!(
        "Remapped classes {:?}: {} matching pixels of {}",
        codes,
        data.iter().filter(|v| !v.is_nan()).count(),
        data.len()
    );

    Raster::new(data, classes.transform, classes.reference.clone())
}
