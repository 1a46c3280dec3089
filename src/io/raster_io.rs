use crate::types::{ExposureError, ExposureResult, GeoTransform, Raster, ReferenceSystem, ZoneRaster, NO_ZONE};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// Basic description of a raster file
#[derive(Debug, Clone)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub band_count: isize,
    pub transform: GeoTransform,
    pub reference: ReferenceSystem,
    pub no_data: Option<f64>,
}

/// GeoTIFF reader backed by GDAL
pub struct RasterReader;

impl RasterReader {
    /// Read one band as f32, converting the declared no-data value to NaN
    pub fn read_raster<P: AsRef<Path>>(path: P, band: isize) -> ExposureResult<Raster> {
        log::info!("Reading raster band {} from: {}", band, path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let reference = ReferenceSystem::from_wkt(dataset.projection());

        if band < 1 || band > dataset.raster_count() {
            return Err(ExposureError::InvalidFormat(format!(
                "Band {} not present in {} ({} bands)",
                band,
                path.as_ref().display(),
                dataset.raster_count()
            )));
        }

        log::debug!("Raster size: {}x{}", width, height);
        log::debug!("Raster geotransform: {:?}", transform);

        let rasterband = dataset.rasterband(band)?;
        let no_data = rasterband.no_data_value();
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let mut data = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| ExposureError::Processing(format!("Failed to reshape raster data: {}", e)))?;

        if let Some(nd) = no_data {
            let nd = nd as f32;
            data.mapv_inplace(|v| if v == nd || (nd.is_nan() && v.is_nan()) { f32::NAN } else { v });
        }

        Ok(Raster::new(data, transform, reference))
    }

    /// Read a rasterized region layer; the no-data id maps to "outside every region"
    pub fn read_zones<P: AsRef<Path>>(path: P) -> ExposureResult<ZoneRaster> {
        log::info!("Reading zone raster from: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let reference = ReferenceSystem::from_wkt(dataset.projection());

        let rasterband = dataset.rasterband(1)?;
        let no_data = rasterband.no_data_value();
        let band_data = rasterband.read_as::<u32>((0, 0), (width, height), (width, height), None)?;

        let mut ids = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| ExposureError::Processing(format!("Failed to reshape zone data: {}", e)))?;

        if let Some(nd) = no_data {
            if nd >= 0.0 && nd <= u32::MAX as f64 {
                let nd = nd as u32;
                ids.mapv_inplace(|id| if id == nd { NO_ZONE } else { id });
            }
        }

        Ok(ZoneRaster::new(ids, transform, reference))
    }

    /// Size, georeferencing and band count without reading pixels
    pub fn describe<P: AsRef<Path>>(path: P) -> ExposureResult<RasterInfo> {
        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count();
        let no_data = if band_count > 0 {
            dataset.rasterband(1)?.no_data_value()
        } else {
            None
        };

        Ok(RasterInfo {
            width,
            height,
            band_count,
            transform: GeoTransform::from_gdal(dataset.geo_transform()?),
            reference: ReferenceSystem::from_wkt(dataset.projection()),
            no_data,
        })
    }
}

/// GeoTIFF writer backed by GDAL
pub struct RasterWriter;

impl RasterWriter {
    /// Save a raster as a single-band f32 GeoTIFF with NaN as no-data
    pub fn write_raster<P: AsRef<Path>>(raster: &Raster, output_path: P) -> ExposureResult<()> {
        log::info!("Saving raster as GeoTIFF: {}", output_path.as_ref().display());

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = raster.dim();

        let mut dataset = driver.create_with_band_type::<f32, _>(
            output_path.as_ref(),
            width as isize,
            height as isize,
            1,
        )?;

        dataset.set_geo_transform(&raster.transform.to_gdal())?;
        if raster.reference.is_defined() {
            dataset.set_projection(raster.reference.wkt())?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<f32> = raster.data.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        rasterband.set_no_data_value(Some(f32::NAN as f64))?;

        Ok(())
    }

    /// Save a zone raster as a single-band u32 GeoTIFF with 0 as no-data
    pub fn write_zones<P: AsRef<Path>>(zones: &ZoneRaster, output_path: P) -> ExposureResult<()> {
        log::info!("Saving zone raster as GeoTIFF: {}", output_path.as_ref().display());

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = zones.ids.dim();

        let mut dataset = driver.create_with_band_type::<u32, _>(
            output_path.as_ref(),
            width as isize,
            height as isize,
            1,
        )?;

        dataset.set_geo_transform(&zones.transform.to_gdal())?;
        if zones.reference.is_defined() {
            dataset.set_projection(zones.reference.wkt())?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<u32> = zones.ids.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        rasterband.set_no_data_value(Some(NO_ZONE as f64))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_raster_round_trip_keeps_nodata_and_georeferencing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pop.tif");
        let reference = ReferenceSystem::from_wkt(
            gdal::spatial_ref::SpatialRef::from_epsg(4326).unwrap().to_wkt().unwrap(),
        );
        let raster = Raster::new(
            Array2::from_shape_vec((2, 2), vec![1.5, f32::NAN, 3.0, 4.0]).unwrap(),
            GeoTransform::north_up(35.0, -15.0, 0.01),
            reference.clone(),
        );

        RasterWriter::write_raster(&raster, &path).unwrap();
        let back = RasterReader::read_raster(&path, 1).unwrap();

        assert_eq!(back.dim(), (2, 2));
        assert_eq!(back.data[[0, 0]], 1.5);
        assert!(back.data[[0, 1]].is_nan());
        assert!((back.transform.top_left_x - 35.0).abs() < 1e-9);
        assert!((back.transform.top_left_y + 15.0).abs() < 1e-9);
        assert!((back.transform.pixel_height + 0.01).abs() < 1e-12);
        assert!(back.reference.matches(&reference));

        let info = RasterReader::describe(&path).unwrap();
        assert_eq!((info.width, info.height, info.band_count), (2, 2, 1));
    }

    #[test]
    fn test_missing_band_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flood.tif");
        let raster = Raster::new(
            Array2::from_elem((1, 1), 1.0),
            GeoTransform::north_up(0.0, 0.0, 1.0),
            ReferenceSystem::undefined(),
        );
        RasterWriter::write_raster(&raster, &path).unwrap();
        assert!(matches!(
            RasterReader::read_raster(&path, 3),
            Err(ExposureError::InvalidFormat(_))
        ));
    }
}
