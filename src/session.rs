//! Interactive exploration of one scan at a time.
//!
//! A [`Session`] owns the loaded volume and the planes derived from it. Each
//! operation reads its inputs from the explicit arguments and the session's own
//! fields, so several sessions can live side by side.

use image::GrayImage;
use ndarray::s;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::common::{AxisConvention, RgbSlice, Slice, Window};
use crate::error::{Result, SliceError};
use crate::geometry::{normalize_orientation, scale_ratios, Volume};
use crate::intensity::window;
use crate::io;
use crate::overlay::{draw_line, to_rgb, LineAxis, DARK_RED, RED};
use crate::plane::{orthogonal_slice, sample, slope};
use crate::resize::{center_crop, fit_square_and_resize, rotate, zoom_rgb, Interpolation};
use crate::roi::{extract, Roi};
use crate::style::{prepare_patch, StyleTransfer};

/// Side of the square views produced by [`Session::rotate_axial`] and [`Session::tilted_image`].
pub const VIEW_SIZE: usize = 512;

#[derive(Debug, Default)]
pub struct Session {
    input_folder: PathBuf,
    scan: Option<String>,
    volume: Option<Volume>,
    image: Option<Slice>,
    sample: Option<Slice>,
    index: usize,
    roi: Option<Roi>,
}

impl Session {
    pub fn new(input_folder: impl Into<PathBuf>) -> Self {
        Self {
            input_folder: input_folder.into(),
            ..Self::default()
        }
    }

    /// Session over a volume that is already in the clinical axis order.
    pub fn from_volume(volume: Volume) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }

    pub fn input_folder(&self) -> &Path {
        &self.input_folder
    }

    /// Names of the scans available in the input folder, sorted.
    pub fn list_scans(&self) -> Result<Vec<String>> {
        Ok(io::list_scans(&self.input_folder)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned))
            .collect())
    }

    /// Loads `name` from the input folder and returns the last valid axial index.
    pub fn load(&mut self, name: &str) -> Result<usize> {
        let loaded = io::load_volume(self.input_folder.join(name))?;
        let volume = Volume::new(normalize_orientation(&loaded.data), loaded.affine);
        let axial = volume.dim().0;
        info!(scan = name, shape = ?volume.dim(), "scan selected");
        self.scan = Some(name.to_string());
        self.volume = Some(volume);
        self.image = None;
        self.sample = None;
        self.index = 0;
        Ok(axial.saturating_sub(1))
    }

    pub fn scan(&self) -> Option<&str> {
        self.scan.as_deref()
    }

    pub fn volume(&self) -> Result<&Volume> {
        self.volume.as_ref().ok_or(SliceError::NoScanLoaded)
    }

    pub fn image(&self) -> Option<&Slice> {
        self.image.as_ref()
    }

    pub fn sample(&self) -> Option<&Slice> {
        self.sample.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn roi(&self) -> Option<Roi> {
        self.roi
    }

    /// Axial plane at `index`, windowed into `[0, 1]`. Becomes the current image.
    pub fn axial_image(&mut self, index: usize, bounds: Window) -> Result<&Slice> {
        let plane = orthogonal_slice(&self.volume()?.data, AxisConvention::Axial, index);
        self.index = index;
        Ok(&*self.image.insert(window(&plane, bounds, 0.0, 1.0)))
    }

    /// Rotates the current image by `-angle` degrees and frames it to [`VIEW_SIZE`].
    pub fn rotate_axial(&mut self, angle: f64) -> Result<&Slice> {
        let image = self.image.as_ref().ok_or(SliceError::NoImage)?;
        let rotated = rotate(&image.view(), -angle);
        Ok(&*self.image.insert(center_crop(&rotated.view(), VIEW_SIZE)))
    }

    /// Samples the square version of `roi`, records it and returns the current
    /// image outlined with the requested bounds. Nothing is recorded on failure.
    pub fn draw_roi(&mut self, roi: Roi) -> Result<RgbSlice> {
        self.sample_roi(roi)?;
        self.roi = Some(roi);
        let image = self.image.as_ref().ok_or(SliceError::NoImage)?;
        let mut rgb = to_rgb(&image.view())?;
        draw_line(&mut rgb, roi.h_min as f64, 0.0, RED, LineAxis::Column);
        draw_line(&mut rgb, roi.h_max as f64, 0.0, RED, LineAxis::Column);
        draw_line(&mut rgb, roi.v_min as f64, 0.0, RED, LineAxis::Row);
        draw_line(&mut rgb, roi.v_max as f64, 0.0, RED, LineAxis::Row);
        Ok(rgb)
    }

    /// Cuts the square, clamped version of the recorded ROI out of the current image.
    pub fn sample_square_roi(&mut self) -> Result<&Slice> {
        let roi = self.roi.ok_or(SliceError::NoRoi)?;
        self.sample_roi(roi)
    }

    fn sample_roi(&mut self, roi: Roi) -> Result<&Slice> {
        let image = self.image.as_ref().ok_or(SliceError::NoImage)?;
        let sampled = extract(&image.view(), &roi.squared());
        debug!(?roi, shape = ?sampled.dim(), "sampled region");
        Ok(&*self.sample.insert(sampled))
    }

    /// Mid-sagittal plane marking where the axial plane at `index`, tilted by
    /// the two angles, enters (red) and leaves (dark red) the volume.
    pub fn position_preview(&self, index: usize, angle_y: f64, angle_z: f64) -> Result<RgbSlice> {
        let volume = self.volume()?;
        let (sx, sy, sz) = volume.dim();
        let plane = orthogonal_slice(&volume.data, AxisConvention::Sagittal, sz / 2);
        let plane = window(&plane, Window::full(), 0.0, 1.0);
        let mut rgb = to_rgb(&plane.view())?;

        let y_slope = slope(angle_y, sx, sy);
        let far_edge = sz as f64 * slope(angle_z, sx, sz) + index as f64;
        draw_line(&mut rgb, far_edge, y_slope, DARK_RED, LineAxis::Row);
        draw_line(&mut rgb, index as f64, y_slope, RED, LineAxis::Row);

        let ratios = scale_ratios(&volume.affine, 2, 0)?;
        let rgb = zoom_rgb(&rgb, ratios, Interpolation::Linear)?;

        let (rows, cols, _) = rgb.dim();
        let centre = cols as f64 / 2.0;
        let margin = rows as f64 / 3.0;
        let begin = (centre - margin).max(0.0) as usize;
        let end = ((centre + margin).max(0.0) as usize).clamp(begin, cols);
        Ok(rgb.slice(s![.., begin..end, ..]).to_owned())
    }

    /// Oblique plane through `index`, windowed and framed to [`VIEW_SIZE`].
    /// Becomes the current image.
    pub fn tilted_image(&mut self, angle_y: f64, angle_z: f64, index: usize, bounds: Window) -> Result<&Slice> {
        let plane = sample(&self.volume()?.data, angle_y, angle_z, index);
        let plane = window(&plane, bounds, 0.0, 1.0);
        self.index = index;
        Ok(&*self.image.insert(fit_square_and_resize(&plane.view(), VIEW_SIZE)))
    }

    /// Sends the current sample through `generator`.
    pub fn generate(&self, generator: &mut dyn StyleTransfer) -> Result<GrayImage> {
        let sample = self.sample.as_ref().ok_or(SliceError::NoSample)?;
        generator.generate(&prepare_patch(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::AffineTransform;
    use ndarray::{Array3, Axis};
    use nifti::writer::WriterOptions;

    fn session(shape: (usize, usize, usize), spacing: [f64; 3]) -> Session {
        let data = Array3::from_shape_fn(shape, |(x, y, z)| (x + y + z) as f64);
        Session::from_volume(Volume::new(data, AffineTransform::from_spacing(spacing)))
    }

    struct Invert;

    impl StyleTransfer for Invert {
        fn generate(&mut self, patch: &GrayImage) -> Result<GrayImage> {
            let mut out = patch.clone();
            out.pixels_mut().for_each(|p| p[0] = 255 - p[0]);
            Ok(out)
        }
    }

    #[test]
    fn operations_need_their_inputs() {
        let mut empty = Session::new("nowhere");
        assert!(matches!(
            empty.axial_image(0, Window::full()),
            Err(SliceError::NoScanLoaded)
        ));
        let mut s = session((4, 4, 4), [1.0, 1.0, 1.0]);
        assert!(matches!(s.rotate_axial(10.0), Err(SliceError::NoImage)));
        assert!(matches!(s.sample_square_roi(), Err(SliceError::NoRoi)));
        assert!(matches!(s.generate(&mut Invert), Err(SliceError::NoSample)));
    }

    #[test]
    fn failed_roi_is_not_recorded() {
        let mut s = session((4, 4, 4), [1.0, 1.0, 1.0]);
        assert!(matches!(
            s.draw_roi(Roi::new(0, 2, 0, 2)),
            Err(SliceError::NoImage)
        ));
        assert_eq!(s.roi(), None);
        assert!(s.sample().is_none());
        assert!(matches!(s.sample_square_roi(), Err(SliceError::NoRoi)));
    }

    #[test]
    fn scans_are_listed_and_loaded_from_the_input_folder() {
        let dir = tempfile::tempdir().unwrap();
        let data = Array3::from_shape_fn((4, 5, 6), |(x, y, z)| (x * 100 + y * 10 + z) as f64);
        WriterOptions::new(dir.path().join("b0002.nii")).write_nifti(&data).unwrap();
        WriterOptions::new(dir.path().join("a0001.nii")).write_nifti(&data).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut s = Session::new(dir.path());
        assert_eq!(s.input_folder(), dir.path());
        assert_eq!(s.list_scans().unwrap(), ["a0001.nii", "b0002.nii"]);

        let expected = normalize_orientation(&data);
        assert_eq!(expected.dim(), (6, 5, 4));
        assert_eq!(s.load("b0002.nii").unwrap(), 5);
        assert_eq!(s.scan(), Some("b0002.nii"));
        assert_eq!(s.volume().unwrap().data, expected);
        assert_eq!(s.axial_image(5, Window::full()).unwrap().dim(), (5, 4));

        assert!(s.load("missing.nii").is_err());
    }

    #[test]
    fn axial_then_rotate_frames_a_fixed_view() {
        let mut s = session((6, 40, 30), [1.0, 1.0, 1.0]);
        let image = s.axial_image(3, Window::full()).unwrap();
        assert_eq!(image.dim(), (40, 30));
        assert_eq!(s.index(), 3);
        let rotated = s.rotate_axial(44.0).unwrap();
        assert_eq!(rotated.dim(), (VIEW_SIZE, VIEW_SIZE));
    }

    #[test]
    fn roi_sampling_is_square_and_clamped() {
        let mut s = session((4, 64, 64), [1.0, 1.0, 1.0]);
        s.axial_image(1, Window::full()).unwrap();
        let rgb = s.draw_roi(Roi::new(10, 50, 40, 60)).unwrap();
        assert_eq!(rgb.dim(), (64, 64, 3));
        assert_eq!(rgb[[0, 10, 0]], 1.0);
        assert_eq!(rgb[[40, 0, 1]], 0.0);
        let sample = s.sample().unwrap();
        // 40x20 padded to 40x40 then pushed back inside the 64-row plane
        assert_eq!(sample.dim(), (40, 40));
        assert_eq!(s.roi(), Some(Roi::new(10, 50, 40, 60)));
    }

    #[test]
    fn tilted_view_is_square() {
        let mut s = session((10, 12, 8), [1.0, 1.0, 1.0]);
        let image = s.tilted_image(20.0, -10.0, 4, Window::new(0.0, 20.0)).unwrap();
        assert_eq!(image.dim(), (VIEW_SIZE, VIEW_SIZE));
        assert!(image.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn preview_is_stretched_along_the_sparse_axis() {
        let data = Array3::zeros((10, 30, 6));
        let s = Session::from_volume(Volume::new(data, AffineTransform::from_spacing([1.0, 1.0, 2.0])));
        let preview = s.position_preview(4, 0.0, 0.0).unwrap();
        let (rows, cols, _) = preview.dim();
        // rows zoomed by spacing[2] / spacing[0] = 2
        assert_eq!(rows, 20);
        // columns 15 - 6.67 .. 15 + 6.67
        assert_eq!(cols, 13);
        assert!(preview.index_axis(Axis(2), 1).iter().all(|&g| g == 0.0));
        // the marker on source row 4 lands between output rows 8 and 9
        assert!(preview[[8, 0, 0]] > 0.7);
        assert!(preview[[9, 0, 0]] > 0.7);
        assert_eq!(preview[[6, 0, 0]], 0.0);
        assert_eq!(preview[[11, 0, 0]], 0.0);
    }

    #[test]
    fn generation_uses_the_fixed_patch() {
        let mut s = session((4, 32, 32), [1.0, 1.0, 1.0]);
        s.axial_image(0, Window::full()).unwrap();
        s.draw_roi(Roi::new(0, 16, 0, 16)).unwrap();
        let out = s.generate(&mut Invert).unwrap();
        assert_eq!(out.dimensions(), (256, 256));
    }
}
