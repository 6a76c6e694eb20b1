//! Intensity windowing: clip raw scanner values and stretch them into a display range.

use ndarray::{Array, ArrayBase, Data, Dimension};

use crate::common::Window;
use crate::error::{Result, SliceError};

/// Clips `data` to `window`, then stretches the clipped values so their own
/// minimum lands on `out_min` and their maximum on `out_max`.
///
/// A constant clipped image has no spread to stretch. It is then placed
/// using the window bounds if both are given and distinct, or sent to
/// `out_min` otherwise. NaN voxels always end up at `out_min`, infinite ones
/// saturate at the matching end of the output range.
pub fn window<S, D>(data: &ArrayBase<S, D>, window: Window, out_min: f64, out_max: f64) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let clipped = data.mapv(|v| clip(v, window));
    let (min, max) = finite_range(clipped.iter().copied());

    let (from, to) = if max > min {
        (min, max)
    } else {
        match (window.low, window.high) {
            (Some(low), Some(high)) if high > low => (low, high),
            _ => return Array::from_elem(data.raw_dim(), out_min),
        }
    };
    let scale = (out_max - out_min) / (to - from);
    let (lo, hi) = (out_min.min(out_max), out_min.max(out_max));
    clipped.mapv(|v| {
        if v.is_nan() {
            out_min
        } else {
            ((v - from) * scale + out_min).clamp(lo, hi)
        }
    })
}

fn clip(value: f64, window: Window) -> f64 {
    let mut value = value;
    if let Some(low) = window.low {
        if value < low {
            value = low;
        }
    }
    if let Some(high) = window.high {
        if value > high {
            value = high;
        }
    }
    value
}

fn finite_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Fixed display window: `low` maps to 0 and `high` to `out_max`, saturating outside.
pub fn normalise_fixed<S, D>(data: &ArrayBase<S, D>, low: f64, high: f64, out_max: f64) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if !(high > low) {
        return Err(SliceError::InvalidWindow { low, high });
    }
    let scale = out_max / (high - low);
    Ok(data.mapv(|v| {
        if v.is_nan() {
            0.0
        } else {
            ((v - low) * scale).clamp(0.0, out_max)
        }
    }))
}

/// Saturating conversion of a display value to a byte.
#[inline]
pub fn to_u8(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
