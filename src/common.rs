use ndarray::{Array2, Array3};
use std::fmt;
use std::str::FromStr;

use crate::error::SliceError;

/// A 2D plane of intensities, rows first.
pub type Slice = Array2<f64>;

/// An annotated plane with a trailing channel axis of length 3.
pub type RgbSlice = Array3<f64>;

/// The three clinical axes of a volume after orientation normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisConvention {
    Axial,
    Coronal,
    Sagittal,
}

impl AxisConvention {
    pub const ALL: [AxisConvention; 3] = [
        AxisConvention::Axial,
        AxisConvention::Coronal,
        AxisConvention::Sagittal,
    ];

    pub fn to_usize(&self) -> usize {
        match self {
            AxisConvention::Axial => 0,
            AxisConvention::Coronal => 1,
            AxisConvention::Sagittal => 2,
        }
    }

    pub fn from_usize(val: usize) -> Result<Self, SliceError> {
        match val {
            0 => Ok(AxisConvention::Axial),
            1 => Ok(AxisConvention::Coronal),
            2 => Ok(AxisConvention::Sagittal),
            _ => Err(SliceError::InvalidAxis(val.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AxisConvention::Axial => "axial",
            AxisConvention::Coronal => "coronal",
            AxisConvention::Sagittal => "sagittal",
        }
    }
}

impl fmt::Display for AxisConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Accepts either the axis name (case-insensitive, `sagital` included) or its index.
impl FromStr for AxisConvention {
    type Err = SliceError;

    fn from_str(val: &str) -> Result<Self, Self::Err> {
        match val.trim().to_ascii_lowercase().as_str() {
            "axial" | "0" => Ok(AxisConvention::Axial),
            "coronal" | "1" => Ok(AxisConvention::Coronal),
            "sagittal" | "sagital" | "2" => Ok(AxisConvention::Sagittal),
            _ => Err(SliceError::InvalidAxis(val.to_string())),
        }
    }
}

/// A plane cut out of a volume, remembering where along the axis it came from.
#[derive(Debug, Clone)]
pub struct IndexedSlice {
    pub slice: Slice,
    pub index: usize,
}

impl IndexedSlice {
    pub fn new(slice: Slice, index: usize) -> Self {
        Self { slice, index }
    }
}

/// Optional intensity bounds. A missing bound falls back to the data's own extreme.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Window {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Window {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    /// Use the data range untouched.
    pub fn full() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    Orthogonal(AxisConvention),
    /// Plane through the principal axis, tilted toward the coronal (`angle_y`)
    /// and sagittal (`angle_z`) axes, in degrees.
    Tilted { angle_y: f64, angle_z: f64 },
}

/// Everything needed to cut one displayable plane out of a volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingRequest {
    pub orientation: Orientation,
    pub index: usize,
    pub window: Window,
}
