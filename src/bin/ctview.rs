//! Headless explorer for a single CT scan.
//!
//! Renders the views of the interactive dashboard to image files: the rotated
//! axial plane with its ROI outline, the ROI sample, the mid-sagittal position
//! preview, the oblique plane and, when a generator command is given, the
//! style-transferred sample.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use ctslice::common::Window;
use ctslice::io::{save_gray, save_rgb};
use ctslice::roi::Roi;
use ctslice::session::Session;
use ctslice::style::CommandTransfer;
use ctslice::SliceError;

#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// directory holding the .nii / .nii.gz scans
    #[arg(short, long)]
    input_dir: PathBuf,

    /// scan file name inside the input directory; defaults to the first one
    #[arg(short, long)]
    scan: Option<String>,

    /// axial index, clamped to the scan
    #[arg(long, default_value_t = 70)]
    index: usize,

    /// in-plane rotation of the axial view, in degrees
    #[arg(short, long, default_value_t = 44.0, allow_negative_numbers = true)]
    rotation: f64,

    /// ROI column bounds on the rotated view
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [160, 420], allow_negative_numbers = true)]
    horizontal: Vec<i64>,

    /// ROI row bounds on the rotated view
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [60, 320], allow_negative_numbers = true)]
    vertical: Vec<i64>,

    /// tilt of the oblique plane toward the coronal axis, in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    tilt_y: f64,

    /// tilt of the oblique plane toward the sagittal axis, in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    tilt_z: f64,

    /// lower Hounsfield bound of the display window
    #[arg(long, allow_negative_numbers = true)]
    low: Option<f64>,

    /// upper Hounsfield bound of the display window
    #[arg(long, allow_negative_numbers = true)]
    high: Option<f64>,

    /// Command that turns <output>/style/ct.png into <output>/style/us.png.
    /// Arguments are separated by whitespace.
    #[arg(short, long)]
    generator: Option<String>,

    /// directory the rendered views are written to
    #[arg(short, long)]
    output: PathBuf,
}

fn bounds(values: &[i64]) -> (i64, i64) {
    match values {
        [a, b, ..] => (*a, *b),
        [a] => (*a, *a),
        [] => (0, 0),
    }
}

fn run(cli: &Args) -> ctslice::Result<()> {
    std::fs::create_dir_all(&cli.output)?;
    let mut session = Session::new(&cli.input_dir);

    let scan = match &cli.scan {
        Some(name) => name.clone(),
        None => session
            .list_scans()?
            .into_iter()
            .next()
            .ok_or(SliceError::NoScanLoaded)?,
    };
    info!(input = %session.input_folder().display(), scan = %scan, "loading scan");
    let max_index = session.load(&scan)?;
    let index = cli.index.min(max_index);
    let window = Window {
        low: cli.low,
        high: cli.high,
    };

    session.axial_image(index, window)?;
    session.rotate_axial(cli.rotation)?;
    let (h_min, h_max) = bounds(&cli.horizontal);
    let (v_min, v_max) = bounds(&cli.vertical);
    let outlined = session.draw_roi(Roi::new(h_min, h_max, v_min, v_max))?;
    save_rgb(&outlined, 255.0, cli.output.join("axial.png"))?;
    if let Some(sample) = session.sample() {
        save_gray(sample, 255.0, cli.output.join("sample.png"))?;
    }

    let preview = session.position_preview(index, cli.tilt_y, cli.tilt_z)?;
    save_rgb(&preview, 255.0, cli.output.join("position.png"))?;

    if let Some(command) = &cli.generator {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SliceError::StyleTransfer("empty generator command".into()))?;
        let mut transfer = CommandTransfer::new(program, parts.collect(), cli.output.join("style"));
        session
            .generate(&mut transfer)?
            .save(cli.output.join("generated.png"))?;
    }

    let tilted = session.tilted_image(cli.tilt_y, cli.tilt_z, index, window)?;
    save_gray(tilted, 255.0, cli.output.join("tilted.png"))?;

    info!(scan = %scan, index, output = %cli.output.display(), "views written");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Args::parse();
    run(&cli).unwrap_or_else(|e| {
        eprintln!("Error! {}", e);
        std::process::exit(-2);
    });
}
