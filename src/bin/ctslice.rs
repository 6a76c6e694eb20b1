//! Commandline batch exporter: every plane of every CT scan in a folder, as images.
//!
//! Each scan is cropped to the configured region, windowed to soft-tissue
//! Hounsfield units, rotated in-plane and padded before its planes are written
//! as `<id>-<index>.<format>`.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

use ctslice::config::PipelineConfig;
use ctslice::export::BatchPipeline;
use ctslice::io::clear_folder;

#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// directory holding the .nii / .nii.gz scans
    input: PathBuf,

    /// directory the slices are written to (created if missing)
    output: PathBuf,

    /// TOML file with pipeline settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Axis to slice along, by name or number:
    ///     axial (0), coronal (1), sagittal (2)
    #[arg(short, long)]
    axis: Option<String>,

    /// Keep every n-th slice.
    #[arg(short, long)]
    stride: Option<usize>,

    /// Image extension of the exported slices, e.g. jpg or png.
    #[arg(short, long)]
    format: Option<String>,

    /// Regex whose first capture group, applied to the file name without its
    /// extension, identifies the scan.
    #[arg(short, long)]
    pattern: Option<String>,

    /// Process scans in parallel.
    #[arg(long)]
    parallel: bool,

    /// Empty the output directory before exporting.
    #[arg(long)]
    clean: bool,
}

fn load_config(args: &Args) -> ctslice::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(axis) = &args.axis {
        config.axis = axis.clone();
    }
    if let Some(stride) = args.stride {
        config.stride = stride;
    }
    if let Some(format) = &args.format {
        config.image_format = format.clone();
    }
    if let Some(pattern) = &args.pattern {
        config.identifier_pattern = pattern.clone();
    }
    config.parallel |= args.parallel;
    Ok(config)
}

fn prepare_output(dir: &Path, clean: bool) -> ctslice::Result<()> {
    if clean && dir.is_dir() {
        let removed = clear_folder(dir)?;
        info!(removed, output = %dir.display(), "cleared output directory");
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Args::parse();
    let config = load_config(&cli).unwrap_or_else(|e| {
        eprintln!("Error! {}", e);
        std::process::exit(-2);
    });
    let pipeline = BatchPipeline::new(config).unwrap_or_else(|e| {
        eprintln!("Error! {}", e);
        std::process::exit(-2);
    });
    prepare_output(&cli.output, cli.clean).unwrap_or_else(|e| {
        eprintln!("Error! {}", e);
        std::process::exit(-2);
    });

    let report = pipeline
        .process_folder(&cli.input, &cli.output)
        .unwrap_or_else(|e| {
            eprintln!("Error! {}", e);
            std::process::exit(-2);
        });

    println!(
        "Exported {} slices from {} scans into {}",
        report.slices_written(),
        report.exported.len(),
        cli.output.display()
    );
    for (scan, e) in &report.failed {
        eprintln!("Skipped {}: {}", scan.display(), e);
    }
}
