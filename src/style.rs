//! Hand-off of a sampled CT patch to an image-to-image style-transfer model.
//!
//! The model is opaque. It receives one square 8-bit gray patch of
//! [`PATCH_SIZE`] pixels and returns one image in the same framing.

use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

use crate::common::Slice;
use crate::error::{Result, SliceError};
use crate::io::to_gray_image;
use crate::resize::{zoom, Interpolation};

pub const PATCH_SIZE: usize = 256;

pub trait StyleTransfer {
    fn generate(&mut self, patch: &GrayImage) -> Result<GrayImage>;
}

/// Stretches a `[0, 1]` sample to the model's patch size and quantizes it.
pub fn prepare_patch(sample: &Slice) -> GrayImage {
    let (rows, cols) = sample.dim();
    if rows == 0 || cols == 0 {
        return GrayImage::new(PATCH_SIZE as u32, PATCH_SIZE as u32);
    }
    let factors = (
        PATCH_SIZE as f64 / rows as f64,
        PATCH_SIZE as f64 / cols as f64,
    );
    let patch = zoom(&sample.view(), factors, Interpolation::Linear);
    to_gray_image(&patch, 255.0)
}

/// Runs an external program that reads the patch from, and writes its result
/// into, a shared working directory.
#[derive(Debug, Clone)]
pub struct CommandTransfer {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub input_name: String,
    pub output_name: String,
}

impl CommandTransfer {
    pub fn new(program: impl Into<String>, args: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            workdir: workdir.into(),
            input_name: "ct.png".to_string(),
            output_name: "us.png".to_string(),
        }
    }
}

impl StyleTransfer for CommandTransfer {
    fn generate(&mut self, patch: &GrayImage) -> Result<GrayImage> {
        std::fs::create_dir_all(&self.workdir)?;
        let input = self.workdir.join(&self.input_name);
        let output = self.workdir.join(&self.output_name);
        patch.save(&input)?;
        match std::fs::remove_file(&output) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        debug!(input = %input.display(), program = %self.program, "running style transfer");

        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.workdir)
            .status()?;
        if !status.success() {
            return Err(SliceError::StyleTransfer(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        if !output.exists() {
            return Err(SliceError::StyleTransfer(format!(
                "{} did not produce {}",
                self.program,
                output.display()
            )));
        }
        info!(output = %output.display(), "style transfer done");
        Ok(image::open(&output)?.to_luma8())
    }
}
