//! End-to-end conversion of a time-series product into a KMZ package

use crate::core::colormap::{ColorMap, ColorMapper};
use crate::core::document::{DocumentAssembler, LegendOverlay};
use crate::core::export::{PackageExporter, PackageNames};
use crate::core::geocode::GridGeocoder;
use crate::core::mask::{count_valid, validity_mask};
use crate::core::placemark::{PixelSource, PlacemarkBuilder, PlacemarkConfig};
use crate::core::timeseries::{compute_shared_range, TimeSeriesEncoder};
use crate::io::archive::ArchiveWriter;
use crate::io::assets::{CHART_LIBRARY, MARKER_ICON};
use crate::io::legend::render_legend;
use crate::io::raster::reader_for;
use crate::types::{KmzError, KmzResult, RasterMetadata, TimeSeriesField, VelocityField};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conversion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmzConfig {
    /// Colour scale name, optionally suffixed with `_r`
    pub colormap: String,
    /// Explicit velocity display limits in output units
    pub vlim: Option<(f64, f64)>,
    /// Every Nth valid pixel becomes a placemark
    pub stride: usize,
    /// Factor from raster units to output units (m -> cm)
    pub unit_scale: f64,
    pub unit_label: String,
    pub icon_scale: f64,
    pub legend_width_px: u32,
}

impl Default for KmzConfig {
    fn default() -> Self {
        Self {
            colormap: "jet".to_string(),
            vlim: None,
            stride: 10,
            unit_scale: 100.0,
            unit_label: "cm".to_string(),
            icon_scale: 0.5,
            legend_width_px: 350,
        }
    }
}

/// In-memory products of one conversion, before packaging
#[derive(Debug, Clone)]
pub struct RenderedProduct {
    pub names: PackageNames,
    pub kml: String,
    pub legend_png: Vec<u8>,
    pub placemark_count: usize,
    pub valid_pixels: usize,
}

/// Validated conversion pipeline
pub struct KmzPipeline {
    config: KmzConfig,
    colormap: ColorMap,
}

impl KmzPipeline {
    pub fn new(config: KmzConfig) -> KmzResult<Self> {
        let colormap: ColorMap = config.colormap.parse()?;
        if config.stride == 0 {
            return Err(KmzError::InvalidConfiguration(
                "stride must be at least 1".to_string(),
            ));
        }
        if !(config.unit_scale.is_finite() && config.unit_scale > 0.0) {
            return Err(KmzError::InvalidConfiguration(format!(
                "unit scale must be positive, got {}",
                config.unit_scale
            )));
        }
        if let Some((vmin, vmax)) = config.vlim {
            if !vmin.is_finite() || !vmax.is_finite() || vmin > vmax {
                return Err(KmzError::InvalidConfiguration(format!(
                    "invalid display limits [{}, {}]",
                    vmin, vmax
                )));
            }
        }
        Ok(Self { config, colormap })
    }

    pub fn config(&self) -> &KmzConfig {
        &self.config
    }

    /// Build the KML document and legend image for loaded rasters
    pub fn render(
        &self,
        base: &str,
        velocity: &VelocityField,
        timeseries: &TimeSeriesField,
    ) -> KmzResult<RenderedProduct> {
        check_same_grid(&velocity.metadata, &timeseries.metadata)?;
        let names = PackageNames::new(base);
        let scale = self.config.unit_scale;

        let mask = validity_mask(&velocity.data);
        let valid_pixels = count_valid(&mask);
        log::info!(
            "{} of {} pixels are valid",
            valid_pixels,
            velocity.data.len()
        );

        let range = compute_shared_range(timeseries, &mask, scale)?;
        let mapper =
            ColorMapper::from_field(self.colormap, self.config.vlim, &velocity.data, &mask, scale)?;
        let grid = GridGeocoder::reconstruct(&timeseries.metadata);

        let builder = PlacemarkBuilder::new(
            mapper,
            TimeSeriesEncoder::new(range, &self.config.unit_label),
            PlacemarkConfig {
                stride: self.config.stride,
                icon_scale: self.config.icon_scale,
                icon_href: MARKER_ICON.to_string(),
                chart_library_href: CHART_LIBRARY.to_string(),
            },
        )?;
        let source = PixelSource {
            grid: &grid,
            velocity: &velocity.data,
            timeseries,
            scale,
        };
        let placemarks = builder.build_all(&mask, &source)?;

        let legend_label = format!("Velocity [{}]", self.config.unit_label);
        let legend_png = render_legend(self.colormap, mapper.vmin(), mapper.vmax(), &legend_label)?;

        log::info!("Creating KML document with {} placemarks", placemarks.len());
        let mut assembler = DocumentAssembler::new(&LegendOverlay {
            name: legend_label,
            image_href: names.legend.clone(),
            width_px: self.config.legend_width_px,
        });
        assembler.append(&placemarks)?;
        let placemark_count = assembler.placemark_count();
        let kml = assembler.serialize()?;

        Ok(RenderedProduct {
            names,
            kml,
            legend_png,
            placemark_count,
            valid_pixels,
        })
    }

    /// Read, convert and package. Returns the path of the written KMZ.
    pub fn run<W: ArchiveWriter>(
        &self,
        timeseries_path: &Path,
        velocity_path: Option<&Path>,
        exporter: &PackageExporter<W>,
    ) -> KmzResult<PathBuf> {
        let velocity_path = match velocity_path {
            Some(p) => p.to_path_buf(),
            None => default_velocity_path(timeseries_path),
        };

        let timeseries = reader_for(timeseries_path)?.read_timeseries(timeseries_path)?;
        let velocity = reader_for(&velocity_path)?.read_velocity(&velocity_path)?;

        let base = base_name(timeseries_path)?;
        let product = self.render(&base, &velocity, &timeseries)?;
        exporter.export(&product.names, &product.kml, &product.legend_png)
    }
}

/// Output base name: the time-series file stem
pub fn base_name(path: &Path) -> KmzResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            KmzError::InvalidConfiguration(format!(
                "Cannot derive an output name from {}",
                path.display()
            ))
        })
}

/// Sibling `velocity` file with the time-series file's extension
pub fn default_velocity_path(timeseries_path: &Path) -> PathBuf {
    let mut path = timeseries_path.with_file_name("velocity");
    if let Some(ext) = timeseries_path.extension() {
        path.set_extension(ext);
    }
    path
}

fn check_same_grid(a: &RasterMetadata, b: &RasterMetadata) -> KmzResult<()> {
    if a.shape() != b.shape() {
        return Err(KmzError::DataShapeMismatch(format!(
            "velocity grid {:?} differs from time-series grid {:?}",
            a.shape(),
            b.shape()
        )));
    }
    let close = |x: f64, y: f64, step: f64| (x - y).abs() <= step.abs() * 1e-3;
    let same_geocoding = close(a.lat0, b.lat0, b.lat_step)
        && close(a.lon0, b.lon0, b.lon_step)
        && close(a.lat_step, b.lat_step, b.lat_step)
        && close(a.lon_step, b.lon_step, b.lon_step);
    if !same_geocoding {
        return Err(KmzError::DataShapeMismatch(format!(
            "velocity and time-series are geocoded differently: {:?} vs {:?}",
            a, b
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(KmzPipeline::new(KmzConfig::default()).is_ok());

        let bad_cmap = KmzConfig { colormap: "rainbowish".to_string(), ..Default::default() };
        assert!(matches!(KmzPipeline::new(bad_cmap), Err(KmzError::InvalidConfiguration(_))));

        let bad_vlim = KmzConfig { vlim: Some((3.0, -3.0)), ..Default::default() };
        assert!(matches!(KmzPipeline::new(bad_vlim), Err(KmzError::InvalidConfiguration(_))));

        let bad_stride = KmzConfig { stride: 0, ..Default::default() };
        assert!(KmzPipeline::new(bad_stride).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(base_name(Path::new("/data/geo_timeseries.bin")).unwrap(), "geo_timeseries");
        assert_eq!(
            default_velocity_path(Path::new("/data/timeseries.bin")),
            PathBuf::from("/data/velocity.bin")
        );
        let names = PackageNames::new("ts");
        assert_eq!(
            (names.kml.as_str(), names.legend.as_str(), names.kmz.as_str()),
            ("ts.kml", "ts_cbar.png", "ts.kmz")
        );
    }

    #[test]
    fn test_grid_mismatch() {
        let a = RasterMetadata::new(10.0, 20.0, -0.1, 0.1, 4, 4).unwrap();
        let b = RasterMetadata::new(10.0, 20.0, -0.1, 0.1, 4, 5).unwrap();
        let c = RasterMetadata::new(11.0, 20.0, -0.1, 0.1, 4, 4).unwrap();
        assert!(check_same_grid(&a, &a).is_ok());
        assert!(matches!(check_same_grid(&a, &b), Err(KmzError::DataShapeMismatch(_))));
        assert!(matches!(check_same_grid(&a, &c), Err(KmzError::DataShapeMismatch(_))));
    }
}
