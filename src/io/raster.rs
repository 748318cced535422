use crate::types::{
    DisplacementCube, KmzError, KmzResult, RasterMetadata, TimeSeriesField, VelocityField,
    VelocityGrid,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Loads velocity and time-series rasters together with their geocoding
pub trait RasterReader {
    fn read_velocity(&self, path: &Path) -> KmzResult<VelocityField>;
    fn read_timeseries(&self, path: &Path) -> KmzResult<TimeSeriesField>;
}

/// Pick a reader from the file extension
pub fn reader_for(path: &Path) -> KmzResult<Box<dyn RasterReader>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("tif") | Some("tiff") => gdal_reader(path),
        _ => Ok(Box::new(RscRasterReader)),
    }
}

#[cfg(feature = "gdal")]
fn gdal_reader(_path: &Path) -> KmzResult<Box<dyn RasterReader>> {
    Ok(Box::new(crate::io::gdal_reader::GdalRasterReader))
}

#[cfg(not(feature = "gdal"))]
fn gdal_reader(path: &Path) -> KmzResult<Box<dyn RasterReader>> {
    Err(KmzError::FileFormat(format!(
        "{}: GeoTIFF input requires the `gdal` feature",
        path.display()
    )))
}

/// Parse a date in `YYYYMMDD` or `YYYY-MM-DD` form
pub fn parse_date(s: &str) -> KmzResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| KmzError::FileFormat(format!("Invalid date '{}'", s)))
}

/// ROI_PAC style flat binary rasters.
///
/// Data is raw float32, band-sequential, with a `<file>.rsc` text sidecar of
/// `KEY value` lines carrying the geocoding (`WIDTH`, `FILE_LENGTH`,
/// `X_FIRST`, `Y_FIRST`, `X_STEP`, `Y_STEP`). Time-series files list their
/// acquisition dates in `DATE_LIST`, one band per date.
pub struct RscRasterReader;

struct RscHeader {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl RscHeader {
    fn read(data_path: &Path) -> KmzResult<Self> {
        let mut name = data_path.as_os_str().to_owned();
        name.push(".rsc");
        let path = PathBuf::from(name);

        let content = std::fs::read_to_string(&path).map_err(|e| {
            KmzError::FileFormat(format!("Cannot read header {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(path, &content))
    }

    fn parse(path: PathBuf, content: &str) -> Self {
        let values = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| {
                let mut parts = l.splitn(2, char::is_whitespace);
                let key = parts.next()?.to_ascii_uppercase();
                let value = parts.next().unwrap_or("").trim().to_string();
                Some((key, value))
            })
            .collect();
        Self { path, values }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> KmzResult<&str> {
        self.get(key).ok_or_else(|| {
            KmzError::FileFormat(format!("{}: missing key {}", self.path.display(), key))
        })
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> KmzResult<T> {
        let raw = self.require(key)?;
        raw.parse().map_err(|_| {
            KmzError::FileFormat(format!(
                "{}: {} has invalid value '{}'",
                self.path.display(),
                key,
                raw
            ))
        })
    }

    fn metadata(&self) -> KmzResult<RasterMetadata> {
        let length = match self.get("FILE_LENGTH") {
            Some(_) => self.number("FILE_LENGTH")?,
            None => self.number("LENGTH")?,
        };
        RasterMetadata::new(
            self.number("Y_FIRST")?,
            self.number("X_FIRST")?,
            self.number("Y_STEP")?,
            self.number("X_STEP")?,
            self.number("WIDTH")?,
            length,
        )
    }

    fn big_endian(&self) -> KmzResult<bool> {
        if let Some(dtype) = self.get("DATA_TYPE") {
            if !dtype.eq_ignore_ascii_case("float32") {
                return Err(KmzError::FileFormat(format!(
                    "{}: unsupported DATA_TYPE {}",
                    self.path.display(),
                    dtype
                )));
            }
        }
        match self.get("BYTE_ORDER").map(str::to_ascii_lowercase).as_deref() {
            None | Some("little-endian") | Some("little") => Ok(false),
            Some("big-endian") | Some("big") => Ok(true),
            Some(other) => Err(KmzError::FileFormat(format!(
                "{}: unknown BYTE_ORDER {}",
                self.path.display(),
                other
            ))),
        }
    }

    fn dates(&self) -> KmzResult<Vec<NaiveDate>> {
        self.require("DATE_LIST")?
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(parse_date)
            .collect()
    }
}

impl RscRasterReader {
    fn read_bands(
        path: &Path,
        header: &RscHeader,
        bands: usize,
    ) -> KmzResult<(RasterMetadata, Vec<f32>)> {
        let metadata = header.metadata()?;
        let big_endian = header.big_endian()?;
        let bytes = std::fs::read(path).map_err(|e| {
            KmzError::FileFormat(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let expected = bands
            .checked_mul(metadata.width)
            .and_then(|n| n.checked_mul(metadata.height))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                KmzError::FileFormat(format!(
                    "{}: raster size {}x{} with {} band(s) is out of range",
                    path.display(),
                    metadata.height,
                    metadata.width,
                    bands
                ))
            })?;
        if bytes.len() != expected {
            return Err(KmzError::FileFormat(format!(
                "{}: expected {} bytes for {} band(s) of {}x{}, found {}",
                path.display(),
                expected,
                bands,
                metadata.height,
                metadata.width,
                bytes.len()
            )));
        }

        let values = bytes
            .chunks_exact(4)
            .map(|c| {
                let raw = [c[0], c[1], c[2], c[3]];
                if big_endian {
                    f32::from_be_bytes(raw)
                } else {
                    f32::from_le_bytes(raw)
                }
            })
            .collect();
        Ok((metadata, values))
    }
}

impl RasterReader for RscRasterReader {
    fn read_velocity(&self, path: &Path) -> KmzResult<VelocityField> {
        log::info!("Reading velocity from: {}", path.display());
        let header = RscHeader::read(path)?;
        let (metadata, values) = Self::read_bands(path, &header, 1)?;
        let data = VelocityGrid::from_shape_vec(metadata.shape(), values)
            .map_err(|e| KmzError::FileFormat(format!("Failed to reshape velocity: {}", e)))?;
        VelocityField::new(metadata, data)
    }

    fn read_timeseries(&self, path: &Path) -> KmzResult<TimeSeriesField> {
        log::info!("Reading time-series from: {}", path.display());
        let header = RscHeader::read(path)?;
        let dates = header.dates()?;
        let (metadata, values) = Self::read_bands(path, &header, dates.len())?;
        let (rows, cols) = metadata.shape();
        let data = DisplacementCube::from_shape_vec((dates.len(), rows, cols), values)
            .map_err(|e| KmzError::FileFormat(format!("Failed to reshape time-series: {}", e)))?;
        log::debug!("Time-series: {} dates on a {}x{} grid", dates.len(), rows, cols);
        TimeSeriesField::new(metadata, dates, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_raster(dir: &Path, name: &str, header: &str, values: &[f32]) -> PathBuf {
        let path = dir.join(name);
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();
        let mut rsc = std::fs::File::create(dir.join(format!("{}.rsc", name))).unwrap();
        rsc.write_all(header.as_bytes()).unwrap();
        path
    }

    const HEADER: &str =
        "WIDTH 3\nFILE_LENGTH 2\nX_FIRST 20.0\nY_FIRST 10.0\nX_STEP 0.5\nY_STEP -0.5\n";

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("20200103").unwrap(), NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
        assert_eq!(parse_date("2020-01-03").unwrap(), NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
        assert!(matches!(parse_date("Jan 3"), Err(KmzError::FileFormat(_))));
    }

    #[test]
    fn test_read_velocity() {
        let dir = tempfile::tempdir().unwrap();
        let values = [0.1, f32::NAN, 0.3, 0.4, 0.5, 0.6];
        let path = write_raster(dir.path(), "velocity.vel", HEADER, &values);

        let field = RscRasterReader.read_velocity(&path).unwrap();
        assert_eq!(field.data.dim(), (2, 3));
        assert_eq!(field.metadata.lat0, 10.0);
        assert_eq!(field.metadata.lon_step, 0.5);
        assert!(field.data[[0, 1]].is_nan());
        assert_eq!(field.data[[1, 2]], 0.6);
    }

    #[test]
    fn test_read_timeseries_band_order() {
        let dir = tempfile::tempdir().unwrap();
        let header = format!("{}DATE_LIST 20200101,20200113\n", HEADER);
        let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let path = write_raster(dir.path(), "timeseries.bin", &header, &values);

        let field = RscRasterReader.read_timeseries(&path).unwrap();
        assert_eq!(field.num_dates(), 2);
        assert_eq!(field.data[[1, 0, 0]], 6.0);
        let series: Vec<f32> = field.series(1, 2).to_vec();
        assert_eq!(series, vec![5.0, 11.0]);
    }

    #[test]
    fn test_truncated_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raster(dir.path(), "velocity.vel", HEADER, &[1.0, 2.0]);
        let result = RscRasterReader.read_velocity(&path);
        assert!(matches!(result, Err(KmzError::FileFormat(_))));
    }

    #[test]
    fn test_oversized_header_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let header = "WIDTH 18446744073709551615\nFILE_LENGTH 2\nX_FIRST 20.0\nY_FIRST 10.0\n\
                      X_STEP 0.5\nY_STEP -0.5\n";
        let path = write_raster(dir.path(), "velocity.vel", header, &[0.0; 6]);
        let result = RscRasterReader.read_velocity(&path);
        assert!(matches!(result, Err(KmzError::FileFormat(_))));
    }

    #[test]
    fn test_missing_header_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raster(dir.path(), "velocity.vel", "WIDTH 3\n", &[0.0; 6]);
        let err = RscRasterReader.read_velocity(&path).unwrap_err();
        assert!(err.to_string().contains("FILE_LENGTH") || err.to_string().contains("LENGTH"));
    }

    #[test]
    fn test_tiff_without_gdal_feature() {
        let result = reader_for(Path::new("velocity.tif"));
        if cfg!(feature = "gdal") {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(KmzError::FileFormat(_))));
        }
    }
}
