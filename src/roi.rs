//! Square regions of interest on a 2D plane.
//!
//! Horizontal bounds index columns and vertical bounds index rows. Bounds are
//! half-open, `[min, max)`.

use ndarray::{s, ArrayView2};

use crate::common::Slice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub h_min: i64,
    pub h_max: i64,
    pub v_min: i64,
    pub v_max: i64,
}

impl Roi {
    pub fn new(h_min: i64, h_max: i64, v_min: i64, v_max: i64) -> Self {
        Self {
            h_min,
            h_max,
            v_min,
            v_max,
        }
    }

    pub fn width(&self) -> i64 {
        self.h_max - self.h_min
    }

    pub fn height(&self) -> i64 {
        self.v_max - self.v_min
    }

    /// Swaps any bound pair given in reverse order.
    pub fn ordered(&self) -> Self {
        Self::new(
            self.h_min.min(self.h_max),
            self.h_min.max(self.h_max),
            self.v_min.min(self.v_max),
            self.v_min.max(self.v_max),
        )
    }

    /// Pads the shorter span so the region becomes square around the same centre.
    /// The trailing side takes the extra pixel when the difference is odd.
    pub fn squared(&self) -> Self {
        let roi = self.ordered();
        let diff = (roi.width() - roi.height()).abs();
        let lead = diff / 2;
        let trail = diff - lead;
        if roi.width() < roi.height() {
            Self::new(roi.h_min - lead, roi.h_max + trail, roi.v_min, roi.v_max)
        } else {
            Self::new(roi.h_min, roi.h_max, roi.v_min - lead, roi.v_max + trail)
        }
    }

    /// Moves the square region inside a `rows × cols` plane.
    ///
    /// A region larger than the plane is first shrunk about its centre to the
    /// plane's shorter side. The result stays square.
    pub fn clamp_to(&self, rows: usize, cols: usize) -> Self {
        let roi = self.ordered();
        let (rows, cols) = (rows as i64, cols as i64);
        let side = roi.width().max(roi.height()).min(rows).min(cols);
        let (h_min, h_max) = fit_span(roi.h_min, roi.width(), side, cols);
        let (v_min, v_max) = fit_span(roi.v_min, roi.height(), side, rows);
        Self::new(h_min, h_max, v_min, v_max)
    }
}

/// Shrinks `[start, start + span)` symmetrically to `side` and slides it into `[0, extent)`.
fn fit_span(start: i64, span: i64, side: i64, extent: i64) -> (i64, i64) {
    let start = start + (span - side) / 2;
    let start = start.min(extent - side).max(0);
    (start, start + side)
}

/// Square region centred on the requested bounds, before any clamping.
pub fn square_roi(h_min: i64, h_max: i64, v_min: i64, v_max: i64) -> Roi {
    Roi::new(h_min, h_max, v_min, v_max).squared()
}

/// Cuts the clamped region out of `plane`.
pub fn extract(plane: &ArrayView2<'_, f64>, roi: &Roi) -> Slice {
    let (rows, cols) = plane.dim();
    let roi = roi.clamp_to(rows, cols);
    plane
        .slice(s![
            roi.v_min as usize..roi.v_max as usize,
            roi.h_min as usize..roi.h_max as usize
        ])
        .to_owned()
}
