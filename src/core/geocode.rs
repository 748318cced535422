use crate::types::RasterMetadata;
use ndarray::Array2;

/// Latitude/longitude grids of a regular geocoded raster
#[derive(Debug, Clone)]
pub struct GeoGrid {
    pub lats: Array2<f64>,
    pub lons: Array2<f64>,
}

impl GeoGrid {
    /// (lat, lon) of one cell
    pub fn coordinate(&self, row: usize, col: usize) -> (f64, f64) {
        (self.lats[[row, col]], self.lons[[row, col]])
    }
}

/// Reconstructs per-pixel coordinates from origin/step metadata
pub struct GridGeocoder;

impl GridGeocoder {
    /// Build (lat, lon) grids of shape (height, width).
    ///
    /// Values are interpolated linearly between the declared origin and the
    /// opposite corner `origin + step * count`, both endpoints included, so
    /// rounding does not accumulate along a row.
    pub fn reconstruct(metadata: &RasterMetadata) -> GeoGrid {
        let (height, width) = metadata.shape();
        let lat1 = metadata.lat0 + metadata.lat_step * height as f64;
        let lon1 = metadata.lon0 + metadata.lon_step * width as f64;

        let lat_axis = linspace(metadata.lat0, lat1, height);
        let lon_axis = linspace(metadata.lon0, lon1, width);

        log::debug!(
            "Geocoding {}x{} grid: lat {:.6} -> {:.6}, lon {:.6} -> {:.6}",
            height, width, metadata.lat0, lat1, metadata.lon0, lon1
        );

        let lats = Array2::from_shape_fn((height, width), |(r, _)| lat_axis[r]);
        let lons = Array2::from_shape_fn((height, width), |(_, c)| lon_axis[c]);
        GeoGrid { lats, lons }
    }
}

/// `n` evenly spaced samples from `start` to `stop` inclusive
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let span = stop - start;
    let last = (n - 1) as f64;
    (0..n).map(|i| start + span * (i as f64 / last)).collect()
}
