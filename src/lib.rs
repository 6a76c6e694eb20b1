//! Slicing, windowing and export of CT volumes stored as NIfTI.
//!
//! Two workflows share the same building blocks:
//!
//! * [`session::Session`] explores one scan at a time: axial and oblique planes,
//!   rotation, ROI sampling and hand-off of the sample to a
//!   [`style::StyleTransfer`] model.
//! * [`export::BatchPipeline`] pushes every scan of a folder through a fixed
//!   chain (orientation, mask, window, rotation, padding) and writes each plane
//!   as an image.

pub mod common;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod intensity;
pub mod io;
pub mod overlay;
pub mod plane;
pub mod resize;
pub mod roi;
pub mod session;
pub mod style;

pub use common::{AxisConvention, IndexedSlice, Orientation, SamplingRequest, Slice, Window};
pub use config::PipelineConfig;
pub use error::{Result, SliceError};
pub use export::BatchPipeline;
pub use geometry::{AffineTransform, Volume};
pub use roi::Roi;
pub use session::Session;
