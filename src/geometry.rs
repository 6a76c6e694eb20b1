//! Axis bookkeeping for loaded volumes.
//!
//! Scans come off disk in the scanner's native axis order. Everything downstream
//! expects the clinical convention `(axial, coronal, sagittal)`, so a volume is
//! passed through [`normalize_orientation`] once, right after loading.

use nalgebra::{Matrix3, Vector3};
use ndarray::{s, Array3, ArrayView3, Axis};

use crate::config::MaskFractions;
use crate::error::{Result, SliceError};

/// Voxel-to-space scaling of a volume. Only the diagonal is ever consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub matrix: Matrix3<f64>,
}

impl AffineTransform {
    pub fn new(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    /// Diagonal affine with the given millimetres per voxel.
    pub fn from_spacing(spacing: [f64; 3]) -> Self {
        Self::new(Matrix3::from_diagonal(&Vector3::from(spacing)))
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    /// Spacing along `axis`. The sign of a diagonal entry encodes a flip, not a
    /// distance, so it is dropped.
    pub fn spacing(&self, axis: usize) -> Result<f64> {
        if axis > 2 {
            return Err(SliceError::InvalidAxis(axis.to_string()));
        }
        let value = self.matrix[(axis, axis)].abs();
        if value == 0.0 || !value.is_finite() {
            return Err(SliceError::DegenerateSpacing {
                axis,
                value: self.matrix[(axis, axis)],
            });
        }
        Ok(value)
    }
}

/// A dense scan together with its voxel scaling.
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<f64>,
    pub affine: AffineTransform,
}

impl Volume {
    pub fn new(data: Array3<f64>, affine: AffineTransform) -> Self {
        Self { data, affine }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }
}

/// Quarter-turn rotation of the plane spanned by `axes`, matching numpy's `rot90`.
pub fn rot90(volume: ArrayView3<'_, f64>, k: i32, axes: (usize, usize)) -> Array3<f64> {
    let (a, b) = axes;
    let mut view = volume;
    match k.rem_euclid(4) {
        0 => {}
        1 => {
            view.invert_axis(Axis(b));
            view.swap_axes(a, b);
        }
        2 => {
            view.invert_axis(Axis(a));
            view.invert_axis(Axis(b));
        }
        _ => {
            view.swap_axes(a, b);
            view.invert_axis(Axis(b));
        }
    }
    view.as_standard_layout().into_owned()
}

pub fn flip(volume: ArrayView3<'_, f64>, axis: usize) -> Array3<f64> {
    let mut view = volume;
    view.invert_axis(Axis(axis));
    view.as_standard_layout().into_owned()
}

/// Remaps a freshly loaded scan into the clinical axis order.
pub fn normalize_orientation(volume: &Array3<f64>) -> Array3<f64> {
    let data = rot90(volume.view(), 1, (1, 2));
    let data = rot90(data.view(), 3, (0, 1));
    let data = rot90(data.view(), 1, (1, 2));
    flip(data.view(), 2)
}

/// Undoes [`normalize_orientation`] exactly.
pub fn denormalize_orientation(volume: &Array3<f64>) -> Array3<f64> {
    let data = flip(volume.view(), 2);
    let data = rot90(data.view(), 3, (1, 2));
    let data = rot90(data.view(), 1, (0, 1));
    rot90(data.view(), 3, (1, 2))
}

/// Spacing ratios of two axes, scaled so the denser one is 1.
///
/// Zooming a slice by these ratios only ever upsamples, which gives
/// square pixels on screen without discarding data.
pub fn scale_ratios(affine: &AffineTransform, axis_a: usize, axis_b: usize) -> Result<(f64, f64)> {
    let a = affine.spacing(axis_a)?;
    let b = affine.spacing(axis_b)?;
    let min = a.min(b);
    Ok((a / min, b / min))
}

/// Keeps the sub-block selected by fractional `[start, end)` ranges along every axis.
pub fn mask_fractions(volume: &Array3<f64>, mask: &MaskFractions) -> Array3<f64> {
    let (nx, ny, nz) = volume.dim();
    let (x0, x1) = fraction_bounds(mask.x, nx);
    let (y0, y1) = fraction_bounds(mask.y, ny);
    let (z0, z1) = fraction_bounds(mask.z, nz);
    volume.slice(s![x0..x1, y0..y1, z0..z1]).to_owned()
}

fn fraction_bounds((start, end): (f64, f64), extent: usize) -> (usize, usize) {
    let begin = ((start * extent as f64) as usize).min(extent);
    let finish = ((end * extent as f64) as usize).min(extent);
    (begin, finish.max(begin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn ramp(shape: (usize, usize, usize)) -> Array3<f64> {
        let (_, ny, nz) = shape;
        Array3::from_shape_fn(shape, |(x, y, z)| (x * ny * nz + y * nz + z) as f64)
    }

    #[test]
    fn rot90_quarter_turn_matches_numpy() {
        // np.rot90(a, 1, (0, 1))[i, j, k] == a[j, n1 - 1 - i, k]
        let a = ramp((2, 3, 4));
        let r = rot90(a.view(), 1, (0, 1));
        assert_eq!(r.dim(), (3, 2, 4));
        for ((i, j, k), v) in r.indexed_iter() {
            assert_eq!(*v, a[[j, 2 - i, k]]);
        }
    }

    #[test]
    fn rot90_three_quarter_turn_matches_numpy() {
        // np.rot90(a, 3, (1, 2))[i, j, k] == a[i, n1 - 1 - k, j]
        let a = ramp((2, 3, 4));
        let r = rot90(a.view(), 3, (1, 2));
        assert_eq!(r.dim(), (2, 4, 3));
        for ((i, j, k), v) in r.indexed_iter() {
            assert_eq!(*v, a[[i, 2 - k, j]]);
        }
    }

    #[test]
    fn full_turn_is_identity() {
        let a = ramp((3, 4, 5));
        assert_eq!(rot90(a.view(), 4, (0, 2)), a);
        assert_eq!(rot90(a.view(), -1, (0, 2)), rot90(a.view(), 3, (0, 2)));
    }

    #[test]
    fn normalized_shape_permutes_axes() {
        let a = ramp((2, 3, 4));
        // (1,2) swap, then (0,1) swap, then (1,2) swap: (2,3,4) -> (2,4,3) -> (4,2,3) -> (4,3,2)
        assert_eq!(normalize_orientation(&a).dim(), (4, 3, 2));
    }

    #[test]
    fn normalize_does_not_touch_input() {
        let a = ramp((2, 3, 4));
        let before = a.clone();
        let _ = normalize_orientation(&a);
        assert_eq!(a, before);
    }

    proptest! {
        #[test]
        fn orientation_roundtrip(nx in 1..7_usize, ny in 1..7_usize, nz in 1..7_usize) {
            let a = ramp((nx, ny, nz));
            let back = denormalize_orientation(&normalize_orientation(&a));
            prop_assert_eq!(back, a);
        }
    }

    #[rstest(/**/       spacing     , a, b,   expected ,
             case([0.7, 0.7, 2.5], 2, 0, (2.5 / 0.7, 1.0)),
             case([0.7, 0.7, 2.5], 0, 1, (1.0, 1.0)),
             case([-0.5, 1.0, 1.5], 0, 2, (1.0, 3.0)),
    )]
    fn ratios(spacing: [f64; 3], a: usize, b: usize, expected: (f64, f64)) {
        let affine = AffineTransform::from_spacing(spacing);
        let (ra, rb) = scale_ratios(&affine, a, b).unwrap();
        assert_float_eq!((ra, rb), expected, abs <= (1e-12, 1e-12));
        assert!(ra.min(rb) == 1.0);
    }

    #[test]
    fn ratios_reject_bad_input() {
        let affine = AffineTransform::from_spacing([1.0, 0.0, 1.0]);
        assert!(matches!(
            scale_ratios(&affine, 0, 1),
            Err(SliceError::DegenerateSpacing { axis: 1, .. })
        ));
        assert!(matches!(
            scale_ratios(&AffineTransform::identity(), 0, 3),
            Err(SliceError::InvalidAxis(_))
        ));
    }

    #[test]
    fn mask_keeps_truncated_fraction_ranges() {
        let a = ramp((20, 20, 20));
        let mask = MaskFractions {
            x: (0.35, 0.5),
            y: (0.3, 0.65),
            z: (0.35, 0.7),
        };
        let m = mask_fractions(&a, &mask);
        // int(0.35*20)=7..10, 6..13, 7..14
        assert_eq!(m.dim(), (3, 7, 7));
        assert_eq!(m[[0, 0, 0]], a[[7, 6, 7]]);
    }
}
