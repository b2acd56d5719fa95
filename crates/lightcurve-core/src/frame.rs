use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A single grayscale image frame.
/// Pixel values are f32 in ADU (not normalized).
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Bit depth of the samples the frame was decoded from
    pub original_bit_depth: u8,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<f32>, bit_depth: u8) -> Self {
        Self {
            data,
            original_bit_depth: bit_depth,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Replace the pixel data, keeping bit depth and metadata.
    pub fn with_data(&self, data: Array2<f32>) -> Self {
        Self {
            data,
            original_bit_depth: self.original_bit_depth,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub frame_index: usize,
    pub timestamp: Option<FrameTimestamp>,
    /// File name (without directory) the frame was read from.
    pub source_name: Option<String>,
    pub gain: Option<GainChannel>,
}

/// One of the two interleaved sensor readout channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainChannel {
    Low,
    #[default]
    High,
}

impl GainChannel {
    /// Row parity of this channel in the interleaved raw image.
    pub fn row_offset(self) -> usize {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

impl std::fmt::Display for GainChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// How (if at all) the hour field of a timestamp was repaired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampCorrection {
    #[default]
    None,
    /// Hour rebuilt from the batch directory's wall-clock name. Best effort.
    DirectoryHint,
    /// Hour wrapped modulo 24 because no directory hint was available. Best effort.
    Wrapped,
}

/// Acquisition time of a frame, in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTimestamp {
    pub time: NaiveDateTime,
    pub correction: TimestampCorrection,
}

impl FrameTimestamp {
    pub fn exact(time: NaiveDateTime) -> Self {
        Self {
            time,
            correction: TimestampCorrection::None,
        }
    }

    /// True if the hour heuristic modified this timestamp.
    pub fn is_heuristic(&self) -> bool {
        self.correction != TimestampCorrection::None
    }

    /// Seconds elapsed since `origin` (negative if earlier).
    pub fn seconds_since(&self, origin: &FrameTimestamp) -> f64 {
        let delta = self.time - origin.time;
        match delta.num_nanoseconds() {
            Some(ns) => ns as f64 * 1e-9,
            None => delta.num_milliseconds() as f64 * 1e-3,
        }
    }
}

/// Sub-pixel position of a star in image coordinates (x = column, y = row).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, drift: DriftVector) -> Self {
        Self {
            x: self.x + drift.dx,
            y: self.y + drift.dy,
        }
    }
}

/// Field-wide displacement between consecutive frames.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriftVector {
    pub dx: f64,
    pub dy: f64,
}
