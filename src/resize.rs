//! Framing operations on 2D planes: rotation, cropping, zooming and padding.
//!
//! Rotation and zoom follow the conventions of `scipy.ndimage`. That means
//! corner-aligned zoom coordinates, a rotated canvas that grows to fit its
//! content, and zero fill outside the source.

use ndarray::{s, stack, Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;

use crate::common::{RgbSlice, Slice};
use crate::config::Padding;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Nearest,
    Linear,
}

const EDGE_EPSILON: f64 = 1e-6;

/// Bilinear sample at fractional `(row, col)`, which must lie inside the plane.
#[inline]
fn bilinear(plane: &ArrayView2<'_, f64>, row: f64, col: f64) -> f64 {
    let (rows, cols) = plane.dim();
    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);

    let dr = row - r0 as f64;
    let dc = col - c0 as f64;

    let v00 = plane[[r0, c0]];
    let v01 = plane[[r0, c1]];
    let v10 = plane[[r1, c0]];
    let v11 = plane[[r1, c1]];

    let v0 = v00.mul_add(1.0 - dc, v01 * dc);
    let v1 = v10.mul_add(1.0 - dc, v11 * dc);
    v0.mul_add(1.0 - dr, v1 * dr)
}

/// Rotates `plane` by `angle` degrees about its centre with bilinear sampling.
///
/// The canvas grows to the bounding box of the rotated plane; pixels that map
/// outside the source are 0.
pub fn rotate(plane: &ArrayView2<'_, f64>, angle: f64) -> Slice {
    let (rows, cols) = plane.dim();
    let (sin, cos) = angle.to_radians().sin_cos();

    // Corners of the source, pushed through the rotation.
    let corners = [(0.0, 0.0), (0.0, cols as f64), (rows as f64, 0.0), (rows as f64, cols as f64)];
    let (mut rmin, mut rmax, mut cmin, mut cmax) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for (r, c) in corners {
        let rr = cos * r + sin * c;
        let cc = -sin * r + cos * c;
        rmin = rmin.min(rr);
        rmax = rmax.max(rr);
        cmin = cmin.min(cc);
        cmax = cmax.max(cc);
    }
    let out_rows = (rmax - rmin + 0.5) as usize;
    let out_cols = (cmax - cmin + 0.5) as usize;
    if rows == 0 || cols == 0 {
        return Array2::zeros((out_rows, out_cols));
    }

    let in_centre = ((rows as f64 - 1.0) / 2.0, (cols as f64 - 1.0) / 2.0);
    let half = ((out_rows as f64 - 1.0) / 2.0, (out_cols as f64 - 1.0) / 2.0);
    let out_centre = (cos * half.0 + sin * half.1, -sin * half.0 + cos * half.1);
    let offset = (in_centre.0 - out_centre.0, in_centre.1 - out_centre.1);
    let max_r = rows as f64 - 1.0;
    let max_c = cols as f64 - 1.0;

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let (r, c) = (r as f64, c as f64);
        let src_r = cos * r + sin * c + offset.0;
        let src_c = -sin * r + cos * c + offset.1;
        if src_r < -EDGE_EPSILON
            || src_c < -EDGE_EPSILON
            || src_r > max_r + EDGE_EPSILON
            || src_c > max_c + EDGE_EPSILON
        {
            return 0.0;
        }
        bilinear(plane, src_r.clamp(0.0, max_r), src_c.clamp(0.0, max_c))
    })
}

/// Rotates every plane across axis 0 by `angle` degrees, i.e. a rotation in axes `(1, 2)`.
pub fn rotate_planes(volume: &Array3<f64>, angle: f64) -> Result<Array3<f64>> {
    let planes: Vec<Slice> = (0..volume.len_of(Axis(0)))
        .into_par_iter()
        .map(|i| rotate(&volume.index_axis(Axis(0), i), angle))
        .collect();
    if planes.is_empty() {
        let (_, rows, cols) = volume.dim();
        let probe = rotate(&Array2::<f64>::zeros((rows, cols)).view(), angle);
        let (out_rows, out_cols) = probe.dim();
        return Ok(Array3::zeros((0, out_rows, out_cols)));
    }
    let views: Vec<ArrayView2<'_, f64>> = planes.iter().map(|p| p.view()).collect();
    Ok(stack(Axis(0), &views)?)
}

/// Source and destination ranges that centre `extent` inside `size` (or `size` inside `extent`).
fn centred_ranges(extent: usize, size: usize) -> ((usize, usize), (usize, usize)) {
    if extent >= size {
        let start = (extent - size) / 2;
        ((start, start + size), (0, size))
    } else {
        let start = (size - extent) / 2;
        ((0, extent), (start, start + extent))
    }
}

/// `size × size` window around the centre of `plane`.
///
/// A plane smaller than `size` along either axis is zero-filled around its
/// centred content.
pub fn center_crop(plane: &ArrayView2<'_, f64>, size: usize) -> Slice {
    let (rows, cols) = plane.dim();
    let ((sr0, sr1), (dr0, dr1)) = centred_ranges(rows, size);
    let ((sc0, sc1), (dc0, dc1)) = centred_ranges(cols, size);
    let mut out = Array2::zeros((size, size));
    out.slice_mut(s![dr0..dr1, dc0..dc1])
        .assign(&plane.slice(s![sr0..sr1, sc0..sc1]));
    out
}

fn zoomed_len(extent: usize, factor: f64) -> usize {
    (extent as f64 * factor).round_ties_even().max(0.0) as usize
}

/// Source coordinate of output index `o` when `extent` is stretched to `out`, corners aligned.
#[inline]
fn zoom_source(o: usize, extent: usize, out: usize) -> f64 {
    if out > 1 {
        o as f64 * (extent as f64 - 1.0) / (out as f64 - 1.0)
    } else {
        0.0
    }
}

/// Resamples `plane` by `(row_factor, col_factor)`.
pub fn zoom(plane: &ArrayView2<'_, f64>, factors: (f64, f64), order: Interpolation) -> Slice {
    let (rows, cols) = plane.dim();
    let out_rows = zoomed_len(rows, factors.0);
    let out_cols = zoomed_len(cols, factors.1);
    if rows == 0 || cols == 0 {
        return Array2::zeros((out_rows, out_cols));
    }
    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let src_r = zoom_source(r, rows, out_rows);
        let src_c = zoom_source(c, cols, out_cols);
        match order {
            Interpolation::Nearest => {
                let nr = ((src_r + 0.5).floor() as usize).min(rows - 1);
                let nc = ((src_c + 0.5).floor() as usize).min(cols - 1);
                plane[[nr, nc]]
            }
            Interpolation::Linear => bilinear(plane, src_r, src_c),
        }
    })
}

/// [`zoom`] applied channel by channel; the channel axis is not resampled.
pub fn zoom_rgb(image: &RgbSlice, factors: (f64, f64), order: Interpolation) -> Result<RgbSlice> {
    let channels: Vec<Slice> = image
        .axis_iter(Axis(2))
        .map(|channel| zoom(&channel, factors, order))
        .collect();
    let views: Vec<ArrayView2<'_, f64>> = channels.iter().map(|c| c.view()).collect();
    Ok(stack(Axis(2), &views)?)
}

/// Crops the largest centred square and resamples it to `target × target`.
pub fn fit_square_and_resize(plane: &ArrayView2<'_, f64>, target: usize) -> Slice {
    let (rows, cols) = plane.dim();
    let shortest = rows.min(cols);
    if shortest == 0 {
        return Array2::zeros((target, target));
    }
    let half = shortest / 2;
    let side = (2 * half).max(1);
    let r0 = (rows / 2).saturating_sub(half);
    let c0 = (cols / 2).saturating_sub(half);
    let square = plane.slice(s![r0..r0 + side, c0..c0 + side]);
    let factor = target as f64 / side as f64;
    let out = zoom(&square, (factor, factor), Interpolation::Nearest);
    if out.dim() == (target, target) {
        out
    } else {
        center_crop(&out.view(), target)
    }
}

/// Zero-pads axes 1 and 2 of `volume`; axis 0 is left alone.
pub fn pad(volume: &Array3<f64>, padding: Padding) -> Array3<f64> {
    let (nx, ny, nz) = volume.dim();
    let extra = padding.before + padding.after;
    let mut out = Array3::zeros((nx, ny + extra, nz + extra));
    let (b, ey, ez) = (padding.before, padding.before + ny, padding.before + nz);
    out.slice_mut(s![.., b..ey, b..ez]).assign(volume);
    out
}
