//! Raster-to-KML transformation components

pub mod geocode;
pub mod mask;
pub mod colormap;
pub mod timeseries;
pub mod kml;
pub mod placemark;
pub mod document;
pub mod export;

// Re-export main types
pub use geocode::{GridGeocoder, GeoGrid};
pub use mask::{validity_mask, valid_pixels, count_valid};
pub use colormap::{ColorMap, ColorMapper, ColorScale, Rgba};
pub use timeseries::{compute_shared_range, ChartPayload, TimeSeriesEncoder};
pub use kml::{KmlElement, KmlNode};
pub use placemark::{IconStyle, PixelSource, PlacemarkBuilder, PlacemarkConfig, PlacemarkEntity};
pub use document::{DocumentAssembler, LegendOverlay};
pub use export::{PackageExporter, PackageNames};
