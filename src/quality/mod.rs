use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::MAX_SAMPLE_VALUE;
use crate::video::{stream_info, Frame, VideoReader};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShapeError {
    #[error("frame shapes differ: {expected:?} vs {got:?}")]
    Mismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

/// Mean squared error between two same-sized frames.
pub fn mse(original: &Frame, modified: &Frame) -> Result<f64, ShapeError> {
    let expected = (original.width(), original.height());
    let got = (modified.width(), modified.height());
    if expected != got {
        return Err(ShapeError::Mismatch { expected, got });
    }
    let n = original.pixels().len();
    if n == 0 {
        return Ok(0.0);
    }
    let sum: u64 = original
        .pixels()
        .iter()
        .zip(modified.pixels())
        .map(|(&a, &b)| {
            let d = a as i64 - b as i64;
            (d * d) as u64
        })
        .sum();
    Ok(sum as f64 / n as f64)
}

/// Peak signal-to-noise ratio in dB for 8-bit samples; `+inf` for identical frames.
pub fn psnr(original: &Frame, modified: &Frame) -> Result<f64, ShapeError> {
    let mse = mse(original, modified)?;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (MAX_SAMPLE_VALUE * MAX_SAMPLE_VALUE / mse).log10())
}

/// PSNR between the first luminance frames of two videos.
pub fn first_frame_psnr(original: &Path, modified: &Path) -> Result<f64> {
    let a = first_frame(original)?;
    let b = first_frame(modified)?;
    Ok(psnr(&a, &b)?)
}

fn first_frame(path: &Path) -> Result<Frame> {
    let info = stream_info(path)?;
    let mut reader = VideoReader::open(path, &info)?;
    reader
        .read_frame()?
        .with_context(|| format!("{} has no frames", path.display()))
}
