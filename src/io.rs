//! Reading scans and writing planes.
//!
//! Scans are NIfTI files (`.nii` or `.nii.gz`) read through the `nifti` crate.
//! Planes are written through the `image` crate, and the encoder is picked from
//! the file extension.

use image::{GrayImage, Luma, Rgb, RgbImage};
use nalgebra::Matrix3;
use ndarray::{Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::common::{RgbSlice, Slice};
use crate::error::{Result, SliceError};
use crate::geometry::{AffineTransform, Volume};
use crate::intensity::to_u8;

const SCAN_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// Whether `path` names a NIfTI scan.
pub fn is_scan_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase())
        .is_some_and(|name| SCAN_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

/// File name of a scan with its NIfTI extension removed.
pub fn scan_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let lower = name.to_ascii_lowercase();
    SCAN_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &name[..name.len() - ext.len()])
}

/// Scans directly inside `dir`, sorted by path.
pub fn list_scans(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SliceError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| SliceError::Config(e.to_string()))?
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file() && is_scan_file(path))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Reads a scan and the spacing part of its header affine.
pub fn load_volume(path: impl AsRef<Path>) -> Result<Volume> {
    let path = path.as_ref();
    let obj = ReaderOptions::new().read_file(path)?;
    let affine = obj.header().affine::<f64>();
    let affine = AffineTransform::new(Matrix3::from_fn(|r, c| affine[(r, c)]));

    let img = obj.into_volume().into_ndarray::<f64>()?;
    let img = match img.ndim() {
        3 => img,
        // a single time point is still a volume
        4 if img.len_of(Axis(3)) == 1 => img.index_axis_move(Axis(3), 0),
        n => return Err(SliceError::NotVolumetric(n)),
    };
    let data = img.into_dimensionality::<Ix3>()?;
    debug!(path = %path.display(), shape = ?data.dim(), "loaded scan");
    Ok(Volume::new(data, affine))
}

/// Writes `plane` as 8-bit gray after multiplying by `scale`.
pub fn save_gray(plane: &Slice, scale: f64, path: impl AsRef<Path>) -> Result<()> {
    to_gray_image(plane, scale).save(path)?;
    Ok(())
}

/// Writes an annotated plane as 8-bit RGB after multiplying by `scale`.
pub fn save_rgb(image: &RgbSlice, scale: f64, path: impl AsRef<Path>) -> Result<()> {
    let (rows, cols, _) = image.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let (r, c) = (y as usize, x as usize);
        Rgb([
            to_u8(image[[r, c, 0]] * scale),
            to_u8(image[[r, c, 1]] * scale),
            to_u8(image[[r, c, 2]] * scale),
        ])
    })
    .save(path)?;
    Ok(())
}

pub fn to_gray_image(plane: &Slice, scale: f64) -> GrayImage {
    let (rows, cols) = plane.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([to_u8(plane[[y as usize, x as usize]] * scale)])
    })
}

/// Empties `dir`, removing files and subdirectories.
///
/// Entries that cannot be removed are logged and left behind. Returns the
/// number of entries removed.
pub fn clear_folder(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read entry");
                continue;
            }
        };
        let outcome = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match outcome {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete"),
        }
    }
    Ok(removed)
}
