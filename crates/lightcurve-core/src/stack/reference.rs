use tracing::{debug, info, warn};

use crate::calibration::MasterCalibration;
use crate::consts::MIN_STACKED_FRAMES;
use crate::error::Result;
use crate::frame::Frame;
use crate::io::source::FrameSource;
use crate::pipeline::config::{StackMethod, StackingConfig};

use super::mean::StreamingMeanStacker;
use super::median::median_stack;

/// Build a calibrated composite of frames `[start, start + count)` for star
/// detection.
///
/// Returns `Ok(None)` when the source is too short to cover the range (or
/// holds fewer than `min_source_frames`), which marks a partial batch.
/// Frames that fail to decode are left out of the stack; if fewer than
/// [`MIN_STACKED_FRAMES`] remain the result is also `Ok(None)`.
pub fn stack_reference(
    source: &dyn FrameSource,
    calibration: &MasterCalibration,
    config: &StackingConfig,
) -> Result<Option<Frame>> {
    let end = config.start + config.count;
    let required = end.max(config.min_source_frames);
    if config.count == 0 || source.len() < required {
        info!(
            available = source.len(),
            required, "Too few frames for a reference stack"
        );
        return Ok(None);
    }

    debug!(start = config.start, end, method = ?config.method, "Stacking reference frames");

    let mut frames = (config.start..end).filter_map(|index| {
        match source.read_frame(index).and_then(|raw| calibration.apply(&raw)) {
            Err(e) if e.is_frame_local() => {
                warn!(frame = index, error = %e, "Leaving unreadable frame out of the stack");
                None
            }
            decoded => Some(decoded),
        }
    });
    let min_frames = MIN_STACKED_FRAMES.min(config.count);

    let (stacked, used) = match config.method {
        StackMethod::Mean => {
            let Some(first) = frames.next().transpose()? else {
                info!("No frame in the stack window could be decoded");
                return Ok(None);
            };
            let mut stacker = StreamingMeanStacker::new(first.height(), first.width());
            stacker.add(&first)?;
            for frame in frames {
                stacker.add(&frame?)?;
            }
            let used = stacker.count();
            if used < min_frames {
                info!(used, "Too few decodable frames for a reference stack");
                return Ok(None);
            }
            let mut mean = stacker.finalize()?;
            mean.metadata = first.metadata;
            (mean, used)
        }
        StackMethod::Median => {
            let decoded = frames.collect::<Result<Vec<_>>>()?;
            if decoded.len() < min_frames {
                info!(used = decoded.len(), "Too few decodable frames for a reference stack");
                return Ok(None);
            }
            (median_stack(&decoded)?, decoded.len())
        }
    };

    info!(frames = used, method = ?config.method, "Reference stack complete");
    Ok(Some(stacked))
}
