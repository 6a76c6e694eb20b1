//! Batch export of every plane of every scan in a folder.
//!
//! Each scan goes through the same fixed chain before its planes are written:
//!
//! `Loaded → OrientationNormalized → Masked → Windowed → Rotated → Padded → Exported`
//!
//! Scans are independent of each other. A scan that fails is reported and the
//! batch moves on to the next one.

use ndarray::{Array3, Axis};
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::common::{AxisConvention, IndexedSlice};
use crate::config::PipelineConfig;
use crate::error::{Result, SliceError};
use crate::geometry::{mask_fractions, normalize_orientation};
use crate::intensity::normalise_fixed;
use crate::io::{list_scans, load_volume, save_gray, scan_stem};
use crate::resize::{pad, rotate_planes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    OrientationNormalized,
    Masked,
    Windowed,
    Rotated,
    Padded,
    Exported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::OrientationNormalized => "orientation-normalized",
            Stage::Masked => "masked",
            Stage::Windowed => "windowed",
            Stage::Rotated => "rotated",
            Stage::Padded => "padded",
            Stage::Exported => "exported",
        };
        write!(f, "{name}")
    }
}

/// Names exported planes `<id>-<index:03>.<extension>`.
///
/// The id is the first capture group of `pattern`, matched against the scan's
/// file name with its `.nii`/`.nii.gz` extension removed.
#[derive(Debug, Clone)]
pub struct SliceNamer {
    pattern: Regex,
    extension: String,
}

impl SliceNamer {
    pub fn new(pattern: &str, extension: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)?;
        if pattern.captures_len() < 2 {
            return Err(SliceError::Config(format!(
                "identifier pattern `{pattern}` needs a capture group"
            )));
        }
        Ok(Self {
            pattern,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn identifier(&self, scan: &Path) -> Result<String> {
        let stem = scan_stem(scan)
            .or_else(|| scan.file_stem().and_then(|s| s.to_str()))
            .ok_or_else(|| SliceError::Identifier(scan.to_path_buf()))?;
        self.pattern
            .captures(stem)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SliceError::Identifier(scan.to_path_buf()))
    }

    pub fn file_name(&self, identifier: &str, index: usize) -> String {
        format!("{identifier}-{index:03}.{}", self.extension)
    }
}

/// The fixed transform chain, from a freshly loaded array to display-ready planes in `[0, 255]`.
pub fn run_pipeline(volume: &Array3<f64>, config: &PipelineConfig) -> Result<Array3<f64>> {
    let data = normalize_orientation(volume);
    debug!(stage = %Stage::OrientationNormalized, shape = ?data.dim());

    let data = mask_fractions(&data, &config.mask);
    debug!(stage = %Stage::Masked, shape = ?data.dim());

    let data = normalise_fixed(&data, config.window_low, config.window_high, 255.0)?;
    debug!(stage = %Stage::Windowed, low = config.window_low, high = config.window_high);

    let data = rotate_planes(&data, config.rotation)?;
    debug!(stage = %Stage::Rotated, angle = config.rotation, shape = ?data.dim());

    let data = pad(&data, config.padding);
    debug!(stage = %Stage::Padded, shape = ?data.dim());
    Ok(data)
}

/// Every `stride`-th plane of `volume` across `axis`.
pub fn slice_array(volume: &Array3<f64>, axis: AxisConvention, stride: usize) -> Vec<IndexedSlice> {
    let ax = Axis(axis.to_usize());
    (0..volume.len_of(ax))
        .step_by(stride.max(1))
        .map(|i| IndexedSlice::new(volume.index_axis(ax, i).to_owned(), i))
        .collect()
}

/// Writes each slice into `dir` as 8-bit gray. Values are expected in `[0, 255]`.
pub fn export_slices(
    slices: &[IndexedSlice],
    dir: &Path,
    namer: &SliceNamer,
    identifier: &str,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    slices
        .iter()
        .map(|s| {
            let path = dir.join(namer.file_name(identifier, s.index));
            save_gray(&s.slice, 1.0, &path)?;
            Ok(path)
        })
        .collect()
}

#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub identifier: String,
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub exported: Vec<FileReport>,
    pub failed: Vec<(PathBuf, SliceError)>,
}

impl BatchReport {
    pub fn slices_written(&self) -> usize {
        self.exported.iter().map(|r| r.written.len()).sum()
    }

    fn skip(&mut self, scan: PathBuf, error: SliceError) {
        warn!(scan = %scan.display(), error = %error, "skipping scan");
        self.failed.push((scan, error));
    }
}

#[derive(Debug, Clone)]
pub struct BatchPipeline {
    config: PipelineConfig,
    axis: AxisConvention,
    namer: SliceNamer,
}

impl BatchPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let axis = config.axis()?;
        let namer = SliceNamer::new(&config.identifier_pattern, &config.image_format)?;
        Ok(Self {
            config,
            axis,
            namer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn process_file(&self, scan: &Path, out_dir: &Path) -> Result<FileReport> {
        let identifier = self.namer.identifier(scan)?;
        self.export_scan(scan, identifier, out_dir)
    }

    fn export_scan(&self, scan: &Path, identifier: String, out_dir: &Path) -> Result<FileReport> {
        let volume = load_volume(scan)?;
        debug!(stage = %Stage::Loaded, scan = %scan.display(), shape = ?volume.dim());

        let data = run_pipeline(&volume.data, &self.config)?;
        let slices = slice_array(&data, self.axis, self.config.stride);
        let written = export_slices(&slices, out_dir, &self.namer, &identifier)?;
        info!(
            stage = %Stage::Exported,
            scan = %scan.display(),
            id = %identifier,
            slices = written.len()
        );
        Ok(FileReport {
            source: scan.to_path_buf(),
            identifier,
            written,
        })
    }

    /// Exports every scan in `in_dir`. Only a failure to list the folder is an error.
    ///
    /// Identifiers are claimed in sorted scan order before anything is written,
    /// so a later scan that maps to an already used id is reported as failed
    /// instead of overwriting the earlier scan's slices.
    pub fn process_folder(&self, in_dir: &Path, out_dir: &Path) -> Result<BatchReport> {
        let scans = list_scans(in_dir)?;
        info!(count = scans.len(), input = %in_dir.display(), "found scans");
        fs::create_dir_all(out_dir)?;

        let mut report = BatchReport::default();
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        let mut jobs = Vec::with_capacity(scans.len());
        for scan in scans {
            let outcome = self.namer.identifier(&scan).and_then(|identifier| {
                match claimed.get(&identifier) {
                    Some(first) => Err(SliceError::DuplicateIdentifier {
                        identifier,
                        path: scan.clone(),
                        first: first.clone(),
                    }),
                    None => {
                        claimed.insert(identifier.clone(), scan.clone());
                        Ok(identifier)
                    }
                }
            });
            match outcome {
                Ok(identifier) => jobs.push((scan, identifier)),
                Err(e) => report.skip(scan, e),
            }
        }

        let run = |(scan, identifier): &(PathBuf, String)| {
            (scan.clone(), self.export_scan(scan, identifier.clone(), out_dir))
        };
        let outcomes: Vec<(PathBuf, Result<FileReport>)> = if self.config.parallel {
            jobs.par_iter().map(run).collect()
        } else {
            jobs.iter().map(run).collect()
        };

        for (scan, outcome) in outcomes {
            match outcome {
                Ok(file) => report.exported.push(file),
                Err(e) => report.skip(scan, e),
            }
        }
        Ok(report)
    }
}

pub fn process_file(scan: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<FileReport> {
    BatchPipeline::new(config.clone())?.process_file(scan, out_dir)
}

pub fn process_folder(in_dir: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<BatchReport> {
    BatchPipeline::new(config.clone())?.process_folder(in_dir, out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nifti::writer::WriterOptions;
    use rstest::rstest;

    fn namer() -> SliceNamer {
        let config = PipelineConfig::default();
        SliceNamer::new(&config.identifier_pattern, "png").unwrap()
    }

    #[rstest(/**/ name,                        expected,
             case("XXXXXXXXXX1234.nii.gz",     "1234"),
             case("LIDC-IDRI-0001.nii.gz",     "0001"),
             case("case_20190117.nii",         "0117"),
             case("dir/LIDC-IDRI-0042.NII.GZ", "0042"),
    )]
    fn identifiers(name: &str, expected: &str) {
        assert_eq!(namer().identifier(Path::new(name)).unwrap(), expected);
    }

    #[test]
    fn names_without_digits_are_rejected() {
        assert!(matches!(
            namer().identifier(Path::new("anonymous.nii.gz")),
            Err(SliceError::Identifier(_))
        ));
        assert!(SliceNamer::new(r"\d{4}", "png").is_err());
    }

    #[test]
    fn file_names_are_zero_padded() {
        let namer = SliceNamer::new(r"(\d{4})$", ".jpg").unwrap();
        assert_eq!(namer.file_name("1234", 7), "1234-007.jpg");
        assert_eq!(namer.file_name("1234", 123), "1234-123.jpg");
    }

    #[rstest(/**/ axis,                     stride, expected,
             case(AxisConvention::Axial,    1,      vec![0, 1, 2]),
             case(AxisConvention::Coronal,  2,      vec![0, 2, 4]),
             case(AxisConvention::Sagittal, 3,      vec![0, 3, 6]),
    )]
    fn enumeration_honours_stride(axis: AxisConvention, stride: usize, expected: Vec<usize>) {
        let v = Array3::<f64>::zeros((3, 5, 7));
        let indices: Vec<usize> = slice_array(&v, axis, stride).iter().map(|s| s.index).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn three_planes_give_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let namer = namer();
        let id = namer.identifier(Path::new("XXXXXXXXXX1234.nii.gz")).unwrap();
        let v = Array3::from_elem((3, 4, 4), 200.0);
        let slices = slice_array(&v, AxisConvention::Axial, 1);
        let written = export_slices(&slices, &dir.path().join("out"), &namer, &id).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["1234-000.png", "1234-001.png", "1234-002.png"]);
        let pixel = image::open(&written[1]).unwrap().to_luma8();
        assert_eq!(pixel.get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn pipeline_masks_rotates_and_pads() {
        let config = PipelineConfig::default();
        let v = Array3::from_elem((20, 20, 20), 0.0);
        let out = run_pipeline(&v, &config).unwrap();
        // mask: 3 x 7 x 7, rotated 45 degrees: 7 * sqrt(2) + 0.5 -> 10, padded by 1 + 2
        assert_eq!(out.dim(), (3, 13, 13));
        assert!(out.iter().all(|v| (0.0..=255.0).contains(v)));
        // border padding stays black, HU 0 sits mid-window
        assert_eq!(out[[0, 0, 0]], 0.0);
        assert!((out[[1, 6, 6]] - 127.5).abs() < 1e-9);
    }

    fn write_scan(path: &Path, shape: (usize, usize, usize)) {
        let data = Array3::from_shape_fn(shape, |(x, y, z)| (x + y + z) as f64 * 10.0 - 150.0);
        WriterOptions::new(path).write_nifti(&data).unwrap();
    }

    #[test]
    fn folder_run_skips_broken_scans() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_scan(&input.path().join("scan0007.nii"), (20, 20, 20));
        fs::write(input.path().join("scan0008.nii"), b"not a nifti file").unwrap();
        fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

        let config = PipelineConfig {
            image_format: "png".to_string(),
            ..PipelineConfig::default()
        };
        let report = process_folder(input.path(), output.path(), &config).unwrap();

        assert_eq!(report.exported.len(), 1);
        assert_eq!(report.exported[0].identifier, "0007");
        assert_eq!(report.slices_written(), 3);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("scan0008.nii"));
        assert!(output.path().join("0007-002.png").exists());
    }

    #[rstest(/**/ parallel, case(false), case(true))]
    fn colliding_identifiers_do_not_overwrite(parallel: bool) {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_scan(&input.path().join("patientA_0001.nii"), (20, 20, 20));
        write_scan(&input.path().join("patientB_0001.nii"), (20, 20, 20));

        let config = PipelineConfig {
            image_format: "png".to_string(),
            parallel,
            ..PipelineConfig::default()
        };
        let report = process_folder(input.path(), output.path(), &config).unwrap();

        assert_eq!(report.exported.len(), 1);
        assert!(report.exported[0].source.ends_with("patientA_0001.nii"));
        assert_eq!(report.slices_written(), 3);
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 3);
        assert_eq!(report.failed.len(), 1);
        match &report.failed[0] {
            (scan, SliceError::DuplicateIdentifier { identifier, first, .. }) => {
                assert!(scan.ends_with("patientB_0001.nii"));
                assert!(first.ends_with("patientA_0001.nii"));
                assert_eq!(identifier, "0001");
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn parallel_run_matches_sequential_output() {
        let input = tempfile::tempdir().unwrap();
        write_scan(&input.path().join("a0001.nii"), (20, 20, 20));
        write_scan(&input.path().join("b0002.nii"), (20, 20, 20));

        let mut names = Vec::new();
        for parallel in [false, true] {
            let output = tempfile::tempdir().unwrap();
            let config = PipelineConfig {
                image_format: "png".to_string(),
                parallel,
                ..PipelineConfig::default()
            };
            let report = BatchPipeline::new(config)
                .unwrap()
                .process_folder(input.path(), output.path())
                .unwrap();
            assert!(report.failed.is_empty());
            let mut listed: Vec<String> = fs::read_dir(output.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            listed.sort();
            names.push(listed);
        }
        assert_eq!(names[0], names[1]);
        assert_eq!(names[0].len(), 6);
    }
}
