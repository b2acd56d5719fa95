pub mod mean;
pub mod median;
pub mod reference;

use crate::error::{LightcurveError, Result};
use crate::frame::Frame;

/// All frames must share the first frame's shape.
pub(crate) fn check_dimensions(frames: &[Frame]) -> Result<()> {
    let expected = match frames.first() {
        Some(f) => f.dim(),
        None => return Ok(()),
    };
    match frames.iter().find(|f| f.dim() != expected) {
        Some(f) => Err(LightcurveError::DimensionMismatch {
            expected,
            found: f.dim(),
        }),
        None => Ok(()),
    }
}
