//! Plane extraction: orthogonal cuts and tilted planes through the principal axis.
//!
//! A tilted plane is found by gathering, not interpolating. For every `(y, z)`
//! of the output the matching `x` is computed, rounded and clamped, and the
//! voxel there is copied. Tilts that run off the volume saturate at its faces.

use ndarray::{Array2, Array3, Axis};

use crate::common::{AxisConvention, Orientation, SamplingRequest, Slice};
use crate::intensity;

/// Per-step displacement along axis `a` for a plane tilted by `angle` degrees
/// toward axis `b`, scaled by the ratio of the two extents.
pub fn slope(angle: f64, extent_a: usize, extent_b: usize) -> f64 {
    angle.to_radians().tan() * extent_a as f64 / extent_b as f64
}

/// Source index along the principal axis for output pixel `(y, z)`.
#[inline]
fn source_index(slope_y: f64, slope_z: f64, index: f64, y: usize, z: usize, extent: usize) -> usize {
    let x = (slope_y * y as f64 + slope_z * z as f64 + index).round();
    if x.is_nan() || x <= 0.0 {
        0
    } else {
        (x as usize).min(extent - 1)
    }
}

/// Oblique plane through `volume` at `index` along axis 0, tilted by `angle_y`
/// toward axis 1 and by `angle_z` toward axis 2.
pub fn sample(volume: &Array3<f64>, angle_y: f64, angle_z: f64, index: usize) -> Slice {
    let (sx, sy, sz) = volume.dim();
    if sx == 0 {
        return Array2::zeros((sy, sz));
    }
    let a = slope(angle_y, sx, sy);
    let b = slope(angle_z, sx, sz);
    let c = index as f64;
    Array2::from_shape_fn((sy, sz), |(y, z)| {
        volume[[source_index(a, b, c, y, z, sx), y, z]]
    })
}

/// Direct cut across `axis`. Out-of-range indices are clamped to the last plane.
pub fn orthogonal_slice(volume: &Array3<f64>, axis: AxisConvention, index: usize) -> Slice {
    let ax = Axis(axis.to_usize());
    let extent = volume.len_of(ax);
    if extent == 0 {
        let mut shape = volume.shape().to_vec();
        shape.remove(ax.index());
        return Array2::zeros((shape[0], shape[1]));
    }
    volume.index_axis(ax, index.min(extent - 1)).to_owned()
}

/// Cuts the requested plane and windows it into `[0, 1]`.
pub fn sample_request(volume: &Array3<f64>, request: &SamplingRequest) -> Slice {
    let plane = match request.orientation {
        Orientation::Orthogonal(axis) => orthogonal_slice(volume, axis, request.index),
        Orientation::Tilted { angle_y, angle_z } => sample(volume, angle_y, angle_z, request.index),
    };
    intensity::window(&plane, request.window, 0.0, 1.0)
}
