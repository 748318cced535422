use crate::io::archive::{ArchiveWriter, ZipArchiveWriter};
use crate::io::assets::AssetStore;
use crate::types::KmzResult;
use std::path::{Path, PathBuf};

/// File names of one package, all derived from the product base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNames {
    pub kml: String,
    pub legend: String,
    pub kmz: String,
}

impl PackageNames {
    pub fn new(base: &str) -> Self {
        Self {
            kml: format!("{}.kml", base),
            legend: format!("{}_cbar.png", base),
            kmz: format!("{}.kmz", base),
        }
    }
}

/// Writes the KML, legend and assets into a single KMZ archive.
///
/// Loose files are staged in a temporary directory and the archive is
/// persisted under its final name only once complete, so a failure leaves
/// neither a partial archive nor stray intermediates behind.
pub struct PackageExporter<W: ArchiveWriter = ZipArchiveWriter> {
    assets: AssetStore,
    out_dir: PathBuf,
    writer: W,
}

impl PackageExporter<ZipArchiveWriter> {
    pub fn new<P: AsRef<Path>>(assets: AssetStore, out_dir: P) -> Self {
        Self::with_writer(assets, out_dir, ZipArchiveWriter)
    }
}

impl<W: ArchiveWriter> PackageExporter<W> {
    pub fn with_writer<P: AsRef<Path>>(assets: AssetStore, out_dir: P, writer: W) -> Self {
        Self {
            assets,
            out_dir: out_dir.as_ref().to_path_buf(),
            writer,
        }
    }

    /// Package `kml` and `legend_png` as `{base}.kmz`, returning its path
    pub fn export(&self, names: &PackageNames, kml: &str, legend_png: &[u8]) -> KmzResult<PathBuf> {
        let assets = self.assets.files()?;
        std::fs::create_dir_all(&self.out_dir)?;

        let staging = tempfile::Builder::new()
            .prefix(".tskmz-")
            .tempdir_in(&self.out_dir)?;

        let kml_path = staging.path().join(&names.kml);
        log::info!("writing {}", names.kml);
        std::fs::write(&kml_path, kml)?;

        let legend_path = staging.path().join(&names.legend);
        log::info!("writing {}", names.legend);
        std::fs::write(&legend_path, legend_png)?;

        let mut files = vec![kml_path, legend_path];
        for (name, source) in assets {
            log::info!("copying {} for reference", name);
            let target = staging.path().join(name);
            std::fs::copy(&source, &target)?;
            files.push(target);
        }

        let partial = tempfile::Builder::new()
            .prefix(".tskmz-")
            .suffix(".kmz.part")
            .tempfile_in(&self.out_dir)?;
        log::info!("writing {}", names.kmz);
        self.writer.bundle(partial.path(), &files)?;

        let kmz_path = self.out_dir.join(&names.kmz);
        partial.persist(&kmz_path).map_err(|e| e.error)?;

        log::info!("removing intermediate files");
        staging.close()?;
        Ok(kmz_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::assets::{CHART_LIBRARY, MARKER_ICON};
    use crate::types::KmzError;
    use std::fs::File;

    fn asset_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MARKER_ICON), b"\x89PNG").unwrap();
        std::fs::write(dir.path().join(CHART_LIBRARY), b"function Dygraph(){}").unwrap();
        dir
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    struct FailingWriter;

    impl ArchiveWriter for FailingWriter {
        fn bundle(&self, output: &Path, _files: &[PathBuf]) -> KmzResult<()> {
            std::fs::write(output, b"partial")?;
            Err(KmzError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    #[test]
    fn test_export_produces_single_archive() {
        let assets = asset_dir();
        let out = tempfile::tempdir().unwrap();
        let exporter = PackageExporter::new(AssetStore::new(assets.path()), out.path());

        let names = PackageNames::new("timeseries");
        let path = exporter.export(&names, "<kml/>", b"png-bytes").unwrap();

        assert_eq!(path, out.path().join("timeseries.kmz"));
        assert_eq!(entries(out.path()), vec!["timeseries.kmz".to_string()]);

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["dygraph-combined.js", "shaded_dot.png", "timeseries.kml", "timeseries_cbar.png"]
        );
        assert_eq!(archive.by_name("timeseries.kml").unwrap().size(), 6);
    }

    #[test]
    fn test_missing_asset_writes_nothing() {
        let assets = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let exporter = PackageExporter::new(AssetStore::new(assets.path()), out.path());

        let result = exporter.export(&PackageNames::new("ts"), "<kml/>", b"");
        assert!(matches!(result, Err(KmzError::Io(_))));
        assert!(entries(out.path()).is_empty());
    }

    #[test]
    fn test_archive_failure_cleans_up() {
        let assets = asset_dir();
        let out = tempfile::tempdir().unwrap();
        let exporter =
            PackageExporter::with_writer(AssetStore::new(assets.path()), out.path(), FailingWriter);

        let result = exporter.export(&PackageNames::new("ts"), "<kml/>", b"");
        assert!(result.is_err());
        assert!(entries(out.path()).is_empty());
    }
}
