use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceError {
    #[error("{0} is not a valid axis value")]
    InvalidAxis(String),

    #[error("Invalid intensity window [{low}, {high}]")]
    InvalidWindow { low: f64, high: f64 },

    #[error("Voxel spacing along axis {axis} is unusable: {value}")]
    DegenerateSpacing { axis: usize, value: f64 },

    #[error("Expected a 3D volume, got {0} dimensions")]
    NotVolumetric(usize),

    #[error("Could not derive an identifier from {0}")]
    Identifier(PathBuf),

    #[error("{path} has identifier {identifier}, already used by {first}")]
    DuplicateIdentifier {
        identifier: String,
        path: PathBuf,
        first: PathBuf,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No scan loaded")]
    NoScanLoaded,

    #[error("No image selected")]
    NoImage,

    #[error("No region of interest recorded")]
    NoRoi,

    #[error("No region sampled")]
    NoSample,

    #[error("Style transfer failed: {0}")]
    StyleTransfer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SliceError>;
