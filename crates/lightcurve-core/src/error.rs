use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LightcurveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    Format(String),

    #[error("Insufficient {what} frames: found {found}, need at least {required}")]
    InsufficientData {
        what: String,
        found: usize,
        required: usize,
    },

    #[error("No frame in {} yields enough stars", directory.display())]
    NoUsableFrame { directory: PathBuf },

    #[error("Star {star} has no signal in its centroid window at frame {frame}")]
    TrackingDegeneracy { star: usize, frame: usize },

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Frame dimensions {found:?} do not match expected {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Empty frame sequence")]
    EmptySequence,
}

impl LightcurveError {
    /// True for errors that only invalidate the frame being decoded.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Format(_) | Self::DimensionMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, LightcurveError>;
