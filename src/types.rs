use chrono::NaiveDate;
use ndarray::{Array2, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

/// Per-pixel velocity values (row x column), NaN where no data
pub type VelocityGrid = Array2<f32>;

/// Per-date displacement values (date x row x column)
pub type DisplacementCube = Array3<f32>;

/// Boolean grid, true where the velocity field carries data
pub type ValidityMask = Array2<bool>;

/// Geocoding metadata of a regular lat/lon raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    /// Latitude of the first row (Y_FIRST)
    pub lat0: f64,
    /// Longitude of the first column (X_FIRST)
    pub lon0: f64,
    /// Signed latitude increment per row (Y_STEP), usually negative
    pub lat_step: f64,
    /// Signed longitude increment per column (X_STEP), usually positive
    pub lon_step: f64,
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
}

impl RasterMetadata {
    pub fn new(
        lat0: f64,
        lon0: f64,
        lat_step: f64,
        lon_step: f64,
        width: usize,
        height: usize,
    ) -> KmzResult<Self> {
        if width == 0 || height == 0 {
            return Err(KmzError::FileFormat(format!(
                "Raster size must be positive, got {}x{}",
                height, width
            )));
        }
        let finite = [lat0, lon0, lat_step, lon_step].iter().all(|v| v.is_finite());
        if !finite {
            return Err(KmzError::FileFormat(
                "Raster origin and step must be finite".to_string(),
            ));
        }
        Ok(Self {
            lat0,
            lon0,
            lat_step,
            lon_step,
            width,
            height,
        })
    }

    /// (rows, columns) as used by ndarray
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// Velocity raster with its geocoding
#[derive(Debug, Clone)]
pub struct VelocityField {
    pub metadata: RasterMetadata,
    pub data: VelocityGrid,
}

impl VelocityField {
    pub fn new(metadata: RasterMetadata, data: VelocityGrid) -> KmzResult<Self> {
        if data.dim() != metadata.shape() {
            return Err(KmzError::DataShapeMismatch(format!(
                "Velocity grid is {:?} but metadata declares {:?}",
                data.dim(),
                metadata.shape()
            )));
        }
        Ok(Self { metadata, data })
    }
}

/// Displacement time-series raster: one band per acquisition date
#[derive(Debug, Clone)]
pub struct TimeSeriesField {
    pub metadata: RasterMetadata,
    pub dates: Vec<NaiveDate>,
    pub data: DisplacementCube,
}

impl TimeSeriesField {
    pub fn new(
        metadata: RasterMetadata,
        dates: Vec<NaiveDate>,
        data: DisplacementCube,
    ) -> KmzResult<Self> {
        let (bands, rows, cols) = data.dim();
        if dates.is_empty() {
            return Err(KmzError::FileFormat(
                "Time-series carries no acquisition dates".to_string(),
            ));
        }
        if bands != dates.len() {
            return Err(KmzError::DataShapeMismatch(format!(
                "Time-series has {} bands but {} dates",
                bands,
                dates.len()
            )));
        }
        if (rows, cols) != metadata.shape() {
            return Err(KmzError::DataShapeMismatch(format!(
                "Time-series grid is {:?} but metadata declares {:?}",
                (rows, cols),
                metadata.shape()
            )));
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(KmzError::FileFormat(format!(
                "Dates must be strictly ascending: {} is followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self {
            metadata,
            dates,
            data,
        })
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    /// Displacement history of one cell, in date order
    pub fn series(&self, row: usize, col: usize) -> ArrayView1<'_, f32> {
        self.data.slice(ndarray::s![.., row, col])
    }
}

/// One valid pixel, built lazily during the scan and dropped once its
/// placemark exists.
#[derive(Debug, Clone)]
pub struct PixelRecord {
    pub row: usize,
    pub col: usize,
    pub lat: f64,
    pub lon: f64,
    pub velocity: f64,
    pub series: Vec<(NaiveDate, f64)>,
}

/// Value range shared by every embedded chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharedChartRange {
    pub min: f64,
    pub max: f64,
}

/// Error types for KMZ generation
#[derive(Debug, thiserror::Error)]
pub enum KmzError {
    #[error("FileFormatError: {0}")]
    FileFormat(String),

    #[error("InvalidConfiguration: {0}")]
    InvalidConfiguration(String),

    #[error("DataShapeMismatch: {0}")]
    DataShapeMismatch(String),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for KmzError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => KmzError::Io(io),
            other => KmzError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("archive error: {}", other),
            )),
        }
    }
}

impl From<quick_xml::Error> for KmzError {
    fn from(e: quick_xml::Error) -> Self {
        KmzError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("XML writing error: {}", e),
        ))
    }
}

impl From<image::ImageError> for KmzError {
    fn from(e: image::ImageError) -> Self {
        KmzError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("image encoding error: {}", e),
        ))
    }
}

/// Result type for KMZ operations
pub type KmzResult<T> = Result<T, KmzError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn meta() -> RasterMetadata {
        RasterMetadata::new(10.0, 20.0, -1.0, 1.0, 3, 2).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_metadata_rejects_empty_grid() {
        assert!(RasterMetadata::new(0.0, 0.0, -1.0, 1.0, 0, 5).is_err());
        assert!(RasterMetadata::new(0.0, 0.0, -1.0, 1.0, 5, 0).is_err());
        assert!(RasterMetadata::new(f64::NAN, 0.0, -1.0, 1.0, 5, 5).is_err());
    }

    #[test]
    fn test_velocity_shape_mismatch() {
        let result = VelocityField::new(meta(), Array2::zeros((3, 3)));
        assert!(matches!(result, Err(KmzError::DataShapeMismatch(_))));
    }

    #[test]
    fn test_timeseries_validation() {
        let dates = vec![date("2020-01-01"), date("2020-01-13")];
        assert!(TimeSeriesField::new(meta(), dates.clone(), Array3::zeros((2, 2, 3))).is_ok());

        let bad_bands = TimeSeriesField::new(meta(), dates.clone(), Array3::zeros((3, 2, 3)));
        assert!(matches!(bad_bands, Err(KmzError::DataShapeMismatch(_))));

        let unsorted = vec![date("2020-01-13"), date("2020-01-01")];
        let result = TimeSeriesField::new(meta(), unsorted, Array3::zeros((2, 2, 3)));
        assert!(matches!(result, Err(KmzError::FileFormat(_))));
    }

    #[test]
    fn test_error_display_names_taxonomy() {
        let err = KmzError::InvalidConfiguration("unknown colormap 'foo'".to_string());
        assert!(err.to_string().starts_with("InvalidConfiguration"));
        let err: KmzError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("IOError"));
    }
}
