use crate::types::{GeoTransform, LstError, LstResult, Raster};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// Read band 1 of a GeoTIFF as f64. No-data samples become NaN.
pub fn read_band<P: AsRef<Path>>(path: P) -> LstResult<Raster> {
    log::debug!("Reading raster: {}", path.as_ref().display());

    let dataset = Dataset::open(path.as_ref())?;
    let geo_transform = dataset.geo_transform()?;
    let (width, height) = dataset.raster_size();

    let rasterband = dataset.rasterband(1)?;
    let no_data = rasterband.no_data_value();
    let band_data = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;

    let mut data = Array2::from_shape_vec((height, width), band_data.data)
        .map_err(|e| LstError::Processing(format!("Failed to reshape band data: {}", e)))?;

    if let Some(nd) = no_data {
        data.mapv_inplace(|v| if v == nd { f64::NAN } else { v });
    }

    Ok(Raster::new(data, GeoTransform::from_gdal(geo_transform)))
}

/// Projection WKT of a raster file
pub fn read_projection<P: AsRef<Path>>(path: P) -> LstResult<String> {
    let dataset = Dataset::open(path.as_ref())?;
    Ok(dataset.projection())
}

/// Write a single-band Float64 GeoTIFF; NaN is declared as no-data
pub fn write_raster<P: AsRef<Path>>(
    path: P,
    raster: &Raster,
    projection_wkt: Option<&str>,
) -> LstResult<()> {
    let (rows, cols) = raster.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<f64, _>(path.as_ref(), cols as _, rows as _, 1)?;

    dataset.set_geo_transform(&raster.geo_transform.to_gdal())?;
    if let Some(wkt) = projection_wkt {
        dataset.set_projection(wkt)?;
    }

    let mut band = dataset.rasterband(1)?;
    band.set_no_data_value(Some(f64::NAN))?;
    let buffer = Buffer::new((cols, rows), raster.data.iter().copied().collect::<Vec<f64>>());
    band.write((0, 0), (cols, rows), &buffer)?;

    log::debug!("Wrote {}x{} raster to {}", cols, rows, path.as_ref().display());
    Ok(())
}
