use crate::types::{KmzError, KmzResult};
use std::path::{Path, PathBuf};

/// Marker icon shared by every placemark
pub const MARKER_ICON: &str = "shaded_dot.png";

/// Chart library loaded by every placemark popup
pub const CHART_LIBRARY: &str = "dygraph-combined.js";

/// Static files shipped with the converter and copied into every package
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The `assets/` directory distributed with this crate
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker_icon(&self) -> PathBuf {
        self.dir.join(MARKER_ICON)
    }

    pub fn chart_library(&self) -> PathBuf {
        self.dir.join(CHART_LIBRARY)
    }

    /// (archive name, source path) of every asset, failing if one is missing
    pub fn files(&self) -> KmzResult<Vec<(&'static str, PathBuf)>> {
        let files = vec![
            (CHART_LIBRARY, self.chart_library()),
            (MARKER_ICON, self.marker_icon()),
        ];
        for (_, path) in &files {
            if !path.is_file() {
                return Err(KmzError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Required asset not found: {}", path.display()),
                )));
            }
        }
        Ok(files)
    }
}
