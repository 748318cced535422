use crate::io::raster::{parse_date, RasterReader};
use crate::types::{
    DisplacementCube, KmzError, KmzResult, RasterMetadata, TimeSeriesField, VelocityField,
    VelocityGrid,
};
use gdal::{Dataset, Metadata};
use ndarray::Axis;
use std::path::Path;

/// GeoTIFF rasters read through GDAL.
///
/// Geocoding comes from the geotransform; time-series bands carry their
/// acquisition date in the band description.
pub struct GdalRasterReader;

fn gdal_error(path: &Path, e: gdal::errors::GdalError) -> KmzError {
    KmzError::FileFormat(format!("{}: {}", path.display(), e))
}

impl GdalRasterReader {
    fn open(path: &Path) -> KmzResult<(Dataset, RasterMetadata)> {
        let dataset = Dataset::open(path).map_err(|e| gdal_error(path, e))?;
        let gt = dataset.geo_transform().map_err(|e| gdal_error(path, e))?;
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(KmzError::FileFormat(format!(
                "{}: rotated geotransforms are not supported",
                path.display()
            )));
        }
        let (width, height) = dataset.raster_size();
        log::debug!("GDAL raster {}x{}, geotransform {:?}", height, width, gt);
        let metadata = RasterMetadata::new(gt[3], gt[0], gt[5], gt[1], width, height)?;
        Ok((dataset, metadata))
    }

    /// One band as a grid, nodata replaced by NaN
    fn read_band(
        path: &Path,
        dataset: &Dataset,
        index: isize,
        metadata: &RasterMetadata,
    ) -> KmzResult<(VelocityGrid, String)> {
        let band = dataset.rasterband(index).map_err(|e| gdal_error(path, e))?;
        let size = (metadata.width, metadata.height);
        let buffer = band
            .read_as::<f32>((0, 0), size, size, None)
            .map_err(|e| gdal_error(path, e))?;
        let nodata = band.no_data_value();
        let mut grid = VelocityGrid::from_shape_vec(metadata.shape(), buffer.data)
            .map_err(|e| KmzError::FileFormat(format!("Failed to reshape band {}: {}", index, e)))?;
        if let Some(nodata) = nodata {
            grid.mapv_inplace(|v| if v as f64 == nodata { f32::NAN } else { v });
        }
        let description = band.description().unwrap_or_default();
        Ok((grid, description))
    }
}

impl RasterReader for GdalRasterReader {
    fn read_velocity(&self, path: &Path) -> KmzResult<VelocityField> {
        log::info!("Reading velocity from: {}", path.display());
        let (dataset, metadata) = Self::open(path)?;
        let (grid, _) = Self::read_band(path, &dataset, 1, &metadata)?;
        VelocityField::new(metadata, grid)
    }

    fn read_timeseries(&self, path: &Path) -> KmzResult<TimeSeriesField> {
        log::info!("Reading time-series from: {}", path.display());
        let (dataset, metadata) = Self::open(path)?;
        let count = dataset.raster_count();

        let mut dates = Vec::new();
        let mut cube = DisplacementCube::zeros((count as usize, metadata.height, metadata.width));
        for (i, mut slot) in (1..=count).zip(cube.axis_iter_mut(Axis(0))) {
            let (grid, description) = Self::read_band(path, &dataset, i, &metadata)?;
            dates.push(parse_date(&description)?);
            slot.assign(&grid);
        }
        TimeSeriesField::new(metadata, dates, cube)
    }
}
