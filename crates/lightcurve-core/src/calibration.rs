//! Master bias/dark/flat construction and application.
//!
//! Masters are built once per batch and shared read-only by every later
//! stage. Science frames are corrected as `(raw - bias) / flat`; the master
//! dark only enters through flat construction.

use std::path::Path;

use ndarray::{Array2, Zip};
use tracing::info;

use crate::consts::{EPSILON, MIN_CALIBRATION_FRAMES};
use crate::error::{LightcurveError, Result};
use crate::frame::Frame;
use crate::io::source::{FileFrameSource, FrameSource};
use crate::pipeline::config::PipelineConfig;
use crate::stack::median::{image_median, median_stack};

/// Calibration masters for one batch.
#[derive(Clone, Debug)]
pub struct MasterCalibration {
    pub bias: Array2<f32>,
    pub dark: Option<Array2<f32>>,
    pub flat: Option<Array2<f32>>,
}

impl MasterCalibration {
    /// A no-op calibration (zero bias, no flat).
    pub fn zero(height: usize, width: usize) -> Self {
        Self {
            bias: Array2::zeros((height, width)),
            dark: None,
            flat: None,
        }
    }

    pub fn from_bias(bias: Frame) -> Self {
        Self {
            bias: bias.data,
            dark: None,
            flat: None,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.bias.dim()
    }

    /// Bias-subtract (and flat-field, when a flat is present) a raw frame.
    pub fn apply(&self, frame: &Frame) -> Result<Frame> {
        if frame.dim() != self.dim() {
            return Err(LightcurveError::DimensionMismatch {
                expected: self.dim(),
                found: frame.dim(),
            });
        }

        let mut data = &frame.data - &self.bias;
        if let Some(flat) = &self.flat {
            Zip::from(&mut data).and(flat).for_each(|v, &f| {
                if f > EPSILON {
                    *v /= f;
                }
            });
        }
        Ok(frame.with_data(data))
    }
}

fn require_frames(what: &str, frames: &[Frame]) -> Result<()> {
    if frames.len() < MIN_CALIBRATION_FRAMES {
        return Err(LightcurveError::InsufficientData {
            what: what.to_string(),
            found: frames.len(),
            required: MIN_CALIBRATION_FRAMES,
        });
    }
    Ok(())
}

/// Pixelwise median of bias frames.
pub fn build_bias(frames: &[Frame]) -> Result<Frame> {
    require_frames("bias", frames)?;
    median_stack(frames)
}

/// Pixelwise median of dark frames.
pub fn build_dark(frames: &[Frame]) -> Result<Frame> {
    require_frames("dark", frames)?;
    median_stack(frames)
}

/// Dark-subtract each flat, normalize it by its own median, then take the
/// pixelwise median of the normalized set.
pub fn build_flat(frames: &[Frame], master_dark: &Frame) -> Result<Frame> {
    require_frames("flat", frames)?;

    let normalized = frames
        .iter()
        .map(|flat| {
            if flat.dim() != master_dark.dim() {
                return Err(LightcurveError::DimensionMismatch {
                    expected: master_dark.dim(),
                    found: flat.dim(),
                });
            }
            let corrected = &flat.data - &master_dark.data;
            let median = image_median(&corrected);
            if median <= EPSILON {
                return Err(LightcurveError::Format(format!(
                    "Flat frame has non-positive median {median} after dark subtraction"
                )));
            }
            Ok(flat.with_data(corrected / median))
        })
        .collect::<Result<Vec<_>>>()?;

    median_stack(&normalized)
}

/// Decode up to `count` frames from a calibration subdirectory.
fn read_calibration_frames(
    dir: &Path,
    config: &PipelineConfig,
    count: usize,
) -> Result<Vec<Frame>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let source = FileFrameSource::from_directory(dir, &config.source)?;
    (0..source.len().min(count))
        .map(|i| source.read_frame(i))
        .collect()
}

/// Build the masters for a batch from its `Bias/`, `Dark/` and `Flat/`
/// subdirectories.
///
/// `Bias/` is always required. Darks and flats are only read when
/// `calibration.use_dark_flat` is set.
pub fn load_calibration(batch_dir: &Path, config: &PipelineConfig) -> Result<MasterCalibration> {
    let count = config.calibration.frame_count;

    let biases = read_calibration_frames(&batch_dir.join("Bias"), config, count)?;
    let bias = build_bias(&biases)?;
    info!(frames = biases.len(), "Master bias built");
    drop(biases);

    if !config.calibration.use_dark_flat {
        return Ok(MasterCalibration::from_bias(bias));
    }

    let darks = read_calibration_frames(&batch_dir.join("Dark"), config, count)?;
    let dark = build_dark(&darks)?;
    info!(frames = darks.len(), "Master dark built");
    drop(darks);

    let flats = read_calibration_frames(&batch_dir.join("Flat"), config, count)?;
    let flat = build_flat(&flats, &dark)?;
    info!(frames = flats.len(), "Master flat built");

    Ok(MasterCalibration {
        bias: bias.data,
        dark: Some(dark.data),
        flat: Some(flat.data),
    })
}
