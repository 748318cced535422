//! Input readers and output collaborators

pub mod raster;
#[cfg(feature = "gdal")]
pub mod gdal_reader;
pub mod assets;
pub mod legend;
pub mod archive;

pub use raster::{reader_for, RasterReader, RscRasterReader};
#[cfg(feature = "gdal")]
pub use gdal_reader::GdalRasterReader;
pub use assets::AssetStore;
pub use legend::render_legend;
pub use archive::{ArchiveWriter, ZipArchiveWriter};
