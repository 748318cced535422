use crate::types::{KmzError, KmzResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundles files into one archive at `output`
pub trait ArchiveWriter {
    fn bundle(&self, output: &Path, files: &[PathBuf]) -> KmzResult<()>;
}

/// Deflate-compressed ZIP (KMZ) archives with flat entry names
pub struct ZipArchiveWriter;

impl ArchiveWriter for ZipArchiveWriter {
    fn bundle(&self, output: &Path, files: &[PathBuf]) -> KmzResult<()> {
        let mut zip = ZipWriter::new(File::create(output)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for path in files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    KmzError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Cannot archive {}", path.display()),
                    ))
                })?;
            log::debug!("Adding {} to archive", name);
            zip.start_file(name, options)?;
            let mut source = File::open(path)?;
            std::io::copy(&mut source, &mut zip)?;
        }

        zip.finish()?;
        Ok(())
    }
}
