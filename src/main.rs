//! Generate a Google Earth KMZ for offline time-series analysis.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tskmz::core::PackageExporter;
use tskmz::{AssetStore, KmzConfig, KmzPipeline};

#[derive(Parser, Debug)]
#[command(name = "tskmz")]
#[command(about = "Generate Google Earth compatible KMZ for offline time-series analysis")]
struct Args {
    /// Time-series file to generate KMZ for
    #[arg(value_name = "timeseries_file")]
    timeseries_file: PathBuf,

    /// Velocity file (default: `velocity` next to the time-series file)
    #[arg(long = "vel", value_name = "velocity_file")]
    vel_file: Option<PathBuf>,

    /// Display limits for the velocity colour scale
    #[arg(
        short = 'v',
        long,
        num_args = 2,
        value_names = ["VMIN", "VMAX"],
        allow_negative_numbers = true
    )]
    vlim: Option<Vec<f64>>,

    /// Colour map used for display, e.g. jet, RdBu, hsv, temperature, viridis
    /// (append _r to reverse)
    #[arg(short = 'c', long, default_value = "jet")]
    colormap: String,

    /// Build a placemark for every Nth valid pixel
    #[arg(long, default_value_t = 10)]
    stride: usize,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    outdir: PathBuf,

    /// Directory holding the marker icon and chart library
    #[arg(long)]
    assets: Option<PathBuf>,
}

fn run(args: Args) -> Result<()> {
    let vlim = args.vlim.map(|v| (v[0], v[1]));
    let config = KmzConfig {
        colormap: args.colormap,
        vlim,
        stride: args.stride,
        ..Default::default()
    };
    let pipeline = KmzPipeline::new(config).context("invalid options")?;

    let assets = args.assets.map(AssetStore::new).unwrap_or_else(AssetStore::bundled);
    let exporter = PackageExporter::new(assets, &args.outdir);

    let kmz = pipeline
        .run(&args.timeseries_file, args.vel_file.as_deref(), &exporter)
        .with_context(|| format!("failed to convert {}", args.timeseries_file.display()))?;
    log::info!("Done: {}", kmz.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
