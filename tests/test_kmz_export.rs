use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tskmz::core::PackageExporter;
use tskmz::{AssetStore, KmzConfig, KmzError, KmzPipeline};

const GEOCODING: &str =
    "WIDTH 4\nFILE_LENGTH 3\nX_FIRST -118.0\nY_FIRST 34.0\nX_STEP 0.001\nY_STEP -0.001\n";

fn write_raster(dir: &Path, name: &str, header: &str, values: &[f32]) -> PathBuf {
    let path = dir.join(name);
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(&path, bytes).unwrap();
    std::fs::write(dir.join(format!("{}.rsc", name)), header).unwrap();
    path
}

/// 3x4 product with two invalid pixels and three acquisitions
fn write_product(dir: &Path) -> PathBuf {
    let mut velocity: Vec<f32> = (0..12).map(|i| i as f32 * 0.001 - 0.005).collect();
    velocity[1] = f32::NAN;
    velocity[10] = f32::NAN;
    write_raster(dir, "velocity.bin", GEOCODING, &velocity);

    let header = format!("{}DATE_LIST 20170105 20170117 20170129\n", GEOCODING);
    let series: Vec<f32> = (0..36).map(|i| (i / 12) as f32 * 0.01).collect();
    write_raster(dir, "timeseries.bin", &header, &series)
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_end_to_end_kmz() {
    let _ = env_logger::builder().is_test(true).try_init();
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let ts_path = write_product(input.path());

    let pipeline = KmzPipeline::new(KmzConfig { stride: 2, ..Default::default() }).unwrap();
    let exporter = PackageExporter::new(AssetStore::bundled(), out.path());
    // Velocity is picked up from the sibling `velocity.bin`
    let kmz = pipeline.run(&ts_path, None, &exporter).unwrap();

    assert_eq!(kmz, out.path().join("timeseries.kmz"));
    assert_eq!(entries(out.path()), vec!["timeseries.kmz".to_string()]);

    let mut archive = zip::ZipArchive::new(File::open(&kmz).unwrap()).unwrap();
    let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["dygraph-combined.js", "shaded_dot.png", "timeseries.kml", "timeseries_cbar.png"]
    );

    let mut kml = String::new();
    archive.by_name("timeseries.kml").unwrap().read_to_string(&mut kml).unwrap();
    // 10 valid pixels, every second one
    assert_eq!(kml.matches("<Placemark").count(), 5);
    assert!(kml.contains("<href>timeseries_cbar.png</href>"));
    assert!(kml.contains("\"2017-01-29, 2\\n\" + "));

    let mut png = Vec::new();
    archive.by_name("timeseries_cbar.png").unwrap().read_to_end(&mut png).unwrap();
    assert_eq!(&png[..4], b"\x89PNG");
}

#[test]
fn test_missing_velocity_file() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let header = format!("{}DATE_LIST 20170105\n", GEOCODING);
    let ts_path = write_raster(input.path(), "timeseries.bin", &header, &[0.0; 12]);

    let pipeline = KmzPipeline::new(KmzConfig::default()).unwrap();
    let exporter = PackageExporter::new(AssetStore::bundled(), out.path());
    let result = pipeline.run(&ts_path, None, &exporter);

    assert!(matches!(result, Err(KmzError::FileFormat(_))));
    assert!(entries(out.path()).is_empty());
}

#[test]
fn test_missing_assets_leave_no_output() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let empty_assets = tempfile::tempdir().unwrap();
    let ts_path = write_product(input.path());
    let vel_path = input.path().join("velocity.bin");

    let pipeline = KmzPipeline::new(KmzConfig::default()).unwrap();
    let exporter = PackageExporter::new(AssetStore::new(empty_assets.path()), out.path());
    let result = pipeline.run(&ts_path, Some(&vel_path), &exporter);

    assert!(matches!(result, Err(KmzError::Io(_))));
    assert!(entries(out.path()).is_empty());
}
