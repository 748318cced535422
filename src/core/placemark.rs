use crate::core::colormap::ColorMapper;
use crate::core::geocode::GeoGrid;
use crate::core::mask::valid_pixels;
use crate::core::timeseries::{ChartPayload, TimeSeriesEncoder};
use crate::types::{
    KmzError, KmzResult, PixelRecord, TimeSeriesField, ValidityMask, VelocityGrid,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Icon style of one marker
#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    /// KML `aabbggrr` colour
    pub color: String,
    pub scale: f64,
    pub icon_href: String,
}

/// One marker: style, chart popup and point geometry
#[derive(Debug, Clone, PartialEq)]
pub struct PlacemarkEntity {
    /// Position in the sampled emission order
    pub index: usize,
    pub style: IconStyle,
    pub description: String,
    /// (longitude, latitude), the KML coordinate order
    pub coordinates: (f64, f64),
}

impl PlacemarkEntity {
    /// `lon,lat` text of the point geometry
    pub fn coordinates_text(&self) -> String {
        format!("{},{}", self.coordinates.0, self.coordinates.1)
    }
}

/// Static parts of every placemark
#[derive(Debug, Clone)]
pub struct PlacemarkConfig {
    /// Every Nth valid pixel becomes a placemark
    pub stride: usize,
    pub icon_scale: f64,
    pub icon_href: String,
    pub chart_library_href: String,
}

impl Default for PlacemarkConfig {
    fn default() -> Self {
        Self {
            stride: 10,
            icon_scale: 0.5,
            icon_href: "shaded_dot.png".to_string(),
            chart_library_href: "dygraph-combined.js".to_string(),
        }
    }
}

/// Read-only rasters a pixel record is assembled from
pub struct PixelSource<'a> {
    pub grid: &'a GeoGrid,
    pub velocity: &'a VelocityGrid,
    pub timeseries: &'a TimeSeriesField,
    /// Unit conversion applied to velocity and displacement
    pub scale: f64,
}

impl<'a> PixelSource<'a> {
    pub fn record(&self, row: usize, col: usize) -> PixelRecord {
        let (lat, lon) = self.grid.coordinate(row, col);
        let series = self
            .timeseries
            .dates
            .iter()
            .zip(self.timeseries.series(row, col).iter())
            .map(|(&date, &v)| (date, v as f64 * self.scale))
            .collect();
        PixelRecord {
            row,
            col,
            lat,
            lon,
            velocity: self.velocity[[row, col]] as f64 * self.scale,
            series,
        }
    }
}

/// Builds placemark entities for sampled valid pixels
pub struct PlacemarkBuilder {
    mapper: ColorMapper,
    encoder: TimeSeriesEncoder,
    config: PlacemarkConfig,
}

impl PlacemarkBuilder {
    pub fn new(
        mapper: ColorMapper,
        encoder: TimeSeriesEncoder,
        config: PlacemarkConfig,
    ) -> KmzResult<Self> {
        if config.stride == 0 {
            return Err(KmzError::InvalidConfiguration(
                "Sampling stride must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            mapper,
            encoder,
            config,
        })
    }

    /// Every `stride`-th valid pixel in row-major order
    pub fn sample(&self, mask: &ValidityMask) -> Vec<(usize, usize)> {
        valid_pixels(mask).step_by(self.config.stride).collect()
    }

    /// Compose one placemark from a pixel and its chart payload
    pub fn build(
        &self,
        index: usize,
        pixel: &PixelRecord,
        chart: &ChartPayload,
    ) -> PlacemarkEntity {
        let color = self.mapper.encode(self.mapper.color_of(pixel.velocity));
        PlacemarkEntity {
            index,
            style: IconStyle {
                color,
                scale: self.config.icon_scale,
                icon_href: self.config.icon_href.clone(),
            },
            description: self.chart_description(chart),
            coordinates: (pixel.lon, pixel.lat),
        }
    }

    fn build_at(
        &self,
        index: usize,
        row: usize,
        col: usize,
        source: &PixelSource,
    ) -> KmzResult<PlacemarkEntity> {
        let pixel = source.record(row, col);
        let chart = self.encoder.encode(&pixel.series)?;
        Ok(self.build(index, &pixel, &chart))
    }

    /// Placemarks for all sampled pixels, in row-major scan order
    pub fn build_all(
        &self,
        mask: &ValidityMask,
        source: &PixelSource,
    ) -> KmzResult<Vec<PlacemarkEntity>> {
        let samples = self.sample(mask);
        log::info!(
            "Building {} placemarks (stride {})",
            samples.len(),
            self.config.stride
        );

        #[cfg(feature = "parallel")]
        let placemarks = samples
            .par_iter()
            .enumerate()
            .map(|(i, &(row, col))| self.build_at(i, row, col, source))
            .collect::<KmzResult<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let placemarks = samples
            .iter()
            .enumerate()
            .map(|(i, &(row, col))| self.build_at(i, row, col, source))
            .collect::<KmzResult<Vec<_>>>()?;

        Ok(placemarks)
    }

    /// Popup HTML: chart container plus the script feeding it
    fn chart_description(&self, chart: &ChartPayload) -> String {
        format!(
            "<script type='text/javascript' src='{lib}'></script>\n\
             <div id='graphdiv'> </div>\n\
             <script type='text/javascript'>\n\
             g = new Dygraph( document.getElementById('graphdiv'),\n\
             {data},\n\
             {options});</script>",
            lib = self.config.chart_library_href,
            data = chart.data_literal(),
            options = chart.options_literal(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::colormap::ColorMap;
    use crate::core::geocode::GridGeocoder;
    use crate::core::mask::validity_mask;
    use crate::core::timeseries::compute_shared_range;
    use crate::types::{RasterMetadata, SharedChartRange};
    use chrono::NaiveDate;
    use ndarray::{Array2, Array3};

    fn builder(stride: usize) -> PlacemarkBuilder {
        let mapper = ColorMapper::new("jet".parse::<ColorMap>().unwrap(), 0.0, 10.0).unwrap();
        let encoder = TimeSeriesEncoder::new(SharedChartRange { min: -1.0, max: 1.0 }, "cm");
        let config = PlacemarkConfig {
            stride,
            ..Default::default()
        };
        PlacemarkBuilder::new(mapper, encoder, config).unwrap()
    }

    fn pixel() -> PixelRecord {
        PixelRecord {
            row: 0,
            col: 0,
            lat: 34.25,
            lon: -117.5,
            velocity: 5.0,
            series: vec![
                (NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 0.0),
                (NaiveDate::from_ymd_opt(2020, 1, 13).unwrap(), 0.5),
            ],
        }
    }

    #[test]
    fn test_zero_stride_rejected() {
        let mapper = ColorMapper::new("jet".parse::<ColorMap>().unwrap(), 0.0, 1.0).unwrap();
        let encoder = TimeSeriesEncoder::new(SharedChartRange { min: 0.0, max: 1.0 }, "cm");
        let config = PlacemarkConfig { stride: 0, ..Default::default() };
        assert!(PlacemarkBuilder::new(mapper, encoder, config).is_err());
    }

    #[test]
    fn test_build_swaps_to_lon_lat() {
        let b = builder(1);
        let p = pixel();
        let chart = b.encoder.encode(&p.series).unwrap();
        let placemark = b.build(0, &p, &chart);

        assert_eq!(placemark.coordinates, (-117.5, 34.25));
        assert_eq!(placemark.coordinates_text(), "-117.5,34.25");
        assert_eq!(placemark.style.scale, 0.5);
        assert_eq!(placemark.style.icon_href, "shaded_dot.png");
        let mid = "jet".parse::<ColorMap>().unwrap().color_at(0.5).to_kml_hex();
        assert_eq!(placemark.style.color, mid);
    }

    #[test]
    fn test_description_embeds_chart() {
        let b = builder(1);
        let p = pixel();
        let chart = b.encoder.encode(&p.series).unwrap();
        let d = b.build(0, &p, &chart).description;

        let script_tag = "<script type='text/javascript' src='dygraph-combined.js'></script>";
        assert!(d.starts_with(script_tag));
        assert!(d.contains("<div id='graphdiv'> </div>"));
        assert!(d.contains("\"2020-01-13, 0.5\\n\" + "));
        assert!(d.contains("valueRange: [-1,1]"));
        assert!(d.contains("ylabel: '[cm]'"));
        assert!(d.ends_with("</script>"));
    }

    #[test]
    fn test_stride_sampling_count_and_order() {
        let mut vel = Array2::<f32>::from_elem((5, 7), 1.0);
        vel[[0, 3]] = f32::NAN;
        vel[[2, 2]] = f32::NAN;
        vel[[4, 6]] = f32::NAN;
        let mask = validity_mask(&vel);
        let valid = 35 - 3;

        for stride in [1, 2, 3, 10, 32, 40] {
            let samples = builder(stride).sample(&mask);
            assert_eq!(samples.len(), (valid + stride - 1) / stride, "stride {}", stride);
            assert!(samples.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_build_all_preserves_scan_order() {
        let meta = RasterMetadata::new(10.0, 20.0, -1.0, 1.0, 4, 4).unwrap();
        let grid = GridGeocoder::reconstruct(&meta);
        let mut vel = Array2::<f32>::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f32 * 0.001);
        vel[[1, 1]] = f32::NAN;
        let mask = validity_mask(&vel);
        let dates = vec![
            NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 6, 13).unwrap(),
        ];
        let ts = TimeSeriesField::new(meta, dates, Array3::<f32>::zeros((2, 4, 4))).unwrap();
        let range = compute_shared_range(&ts, &mask, 100.0).unwrap();

        let viridis = "viridis".parse().unwrap();
        let mapper = ColorMapper::from_field(viridis, None, &vel, &mask, 100.0).unwrap();
        let encoder = TimeSeriesEncoder::new(range, "cm");
        let config = PlacemarkConfig { stride: 2, ..Default::default() };
        let b = PlacemarkBuilder::new(mapper, encoder, config).unwrap();

        let source = PixelSource { grid: &grid, velocity: &vel, timeseries: &ts, scale: 100.0 };
        let placemarks = b.build_all(&mask, &source).unwrap();

        assert_eq!(placemarks.len(), 8); // ceil(15 / 2)
        let expected: Vec<_> = b
            .sample(&mask)
            .into_iter()
            .map(|(r, c)| (grid.lons[[r, c]], grid.lats[[r, c]]))
            .collect();
        let actual: Vec<_> = placemarks.iter().map(|p| p.coordinates).collect();
        assert_eq!(actual, expected);
        assert!(placemarks.iter().enumerate().all(|(i, p)| p.index == i));
    }
}
