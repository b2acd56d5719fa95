use ndarray::Array2;

use crate::error::{LightcurveError, Result};
use crate::frame::Frame;

use super::check_dimensions;

/// Stack frames by computing the mean at each pixel.
pub fn mean_stack(frames: &[Frame]) -> Result<Frame> {
    if frames.is_empty() {
        return Err(LightcurveError::EmptySequence);
    }
    check_dimensions(frames)?;

    let mut stacker = StreamingMeanStacker::new(frames[0].height(), frames[0].width());
    for frame in frames {
        stacker.add(frame)?;
    }
    let mut result = stacker.finalize()?;
    result.metadata = frames[0].metadata.clone();
    Ok(result)
}

/// Accumulates frames one at a time so only the running sum stays in memory.
pub struct StreamingMeanStacker {
    sum: Array2<f64>,
    count: usize,
    bit_depth: u8,
}

impl StreamingMeanStacker {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            sum: Array2::zeros((height, width)),
            count: 0,
            bit_depth: 0,
        }
    }

    pub fn add(&mut self, frame: &Frame) -> Result<()> {
        if frame.dim() != self.sum.dim() {
            return Err(LightcurveError::DimensionMismatch {
                expected: self.sum.dim(),
                found: frame.dim(),
            });
        }
        self.sum
            .zip_mut_with(&frame.data, |acc, &v| *acc += v as f64);
        self.count += 1;
        self.bit_depth = frame.original_bit_depth;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finalize(self) -> Result<Frame> {
        if self.count == 0 {
            return Err(LightcurveError::EmptySequence);
        }
        let n = self.count as f64;
        let mean = self.sum.mapv(|v| (v / n) as f32);
        Ok(Frame::new(mean, self.bit_depth))
    }
}
