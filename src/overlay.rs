//! Annotation of display planes: ROI outlines and plane-position markers.

use ndarray::{stack, ArrayView2, Axis};

use crate::common::RgbSlice;
use crate::error::Result;

pub type Color = [f64; 3];

pub const RED: Color = [1.0, 0.0, 0.0];
pub const DARK_RED: Color = [0.5, 0.0, 0.0];

/// Which coordinate `index` addresses when drawing a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAxis {
    /// `index` is a row; the line runs across the columns.
    Row,
    /// `index` is a column; the line runs down the rows.
    Column,
}

/// Gray plane repeated into three channels.
pub fn to_rgb(plane: &ArrayView2<'_, f64>) -> Result<RgbSlice> {
    Ok(stack(Axis(2), &[plane.view(), plane.view(), plane.view()])?)
}

/// Paints a straight line `index + slope * i` over every step `i` of the running axis.
///
/// Positions are truncated toward zero and clamped to the plane. Nothing is
/// drawn when `index` itself lies outside the plane.
pub fn draw_line(image: &mut RgbSlice, index: f64, slope: f64, color: Color, axis: LineAxis) {
    let (rows, cols, _) = image.dim();
    let (extent, steps) = match axis {
        LineAxis::Row => (rows, cols),
        LineAxis::Column => (cols, rows),
    };
    if !index.is_finite() || index < 0.0 || index >= extent as f64 {
        return;
    }
    for i in 0..steps {
        let at = (slope * i as f64 + index) as i64;
        let at = at.clamp(0, extent as i64 - 1) as usize;
        let (r, c) = match axis {
            LineAxis::Row => (at, i),
            LineAxis::Column => (i, at),
        };
        for (ch, value) in color.iter().enumerate() {
            image[[r, c, ch]] = *value;
        }
    }
}
