//! Settings for the batch export pipeline, optionally read from a TOML file.

use serde::Deserialize;
use std::path::Path;

use crate::common::AxisConvention;
use crate::error::{Result, SliceError};

/// Fractional `[start, end)` ranges kept along each axis by the region mask.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MaskFractions {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub z: (f64, f64),
}

impl Default for MaskFractions {
    fn default() -> Self {
        Self {
            x: (0.35, 0.5),
            y: (0.3, 0.65),
            z: (0.35, 0.7),
        }
    }
}

/// Zero padding added before and after each in-plane axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub before: usize,
    pub after: usize,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            before: 1,
            after: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hounsfield value mapped to black.
    pub window_low: f64,
    /// Hounsfield value mapped to white.
    pub window_high: f64,
    /// In-plane rotation applied to every plane across axis 0, in degrees.
    pub rotation: f64,
    pub mask: MaskFractions,
    pub padding: Padding,
    /// Axis name or index to enumerate slices along.
    pub axis: String,
    pub stride: usize,
    /// Extension of exported images; also selects the encoder.
    pub image_format: String,
    /// Regex with one capture group, matched against the scan's file stem.
    pub identifier_pattern: String,
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_low: -150.0,
            window_high: 150.0,
            rotation: 45.0,
            mask: MaskFractions::default(),
            padding: Padding::default(),
            axis: AxisConvention::Axial.name().to_string(),
            stride: 1,
            image_format: "jpg".to_string(),
            identifier_pattern: r"(\d{4})$".to_string(),
            parallel: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn axis(&self) -> Result<AxisConvention> {
        self.axis.parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(SliceError::Config("stride must be at least 1".into()));
        }
        if !(self.window_high > self.window_low) {
            return Err(SliceError::InvalidWindow {
                low: self.window_low,
                high: self.window_high,
            });
        }
        for (name, (start, end)) in [("x", self.mask.x), ("y", self.mask.y), ("z", self.mask.z)] {
            if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) || start > end {
                return Err(SliceError::Config(format!(
                    "mask range for {name} must satisfy 0 <= start <= end <= 1, got [{start}, {end}]"
                )));
            }
        }
        if self.image_format.is_empty() {
            return Err(SliceError::Config("image_format must not be empty".into()));
        }
        self.axis()?;
        Ok(())
    }
}
