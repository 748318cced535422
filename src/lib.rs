//! tskmz: InSAR displacement time-series to Google Earth KMZ
//!
//! Turns a geocoded displacement time-series and its velocity raster into a
//! self-contained KMZ package. Every sampled valid pixel becomes a coloured
//! placemark whose popup charts that pixel's displacement history.

pub mod types;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    KmzError, KmzResult, PixelRecord, RasterMetadata, SharedChartRange, TimeSeriesField,
    ValidityMask, VelocityField,
};

pub use io::{AssetStore, RasterReader, RscRasterReader, ZipArchiveWriter};
pub use pipeline::{KmzConfig, KmzPipeline, RenderedProduct};
