use std::f64::consts::PI;
use std::path::Path;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::calibration::MasterCalibration;
use crate::error::{LightcurveError, Result};
use crate::frame::Frame;
use crate::io::source::FrameSource;

use super::background::estimate_background;
use super::components::connected_components;
use super::config::DetectionConfig;

/// A source found by thresholded extraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectedStar {
    /// Column coordinate of the weighted centroid.
    pub x: f64,
    /// Row coordinate of the weighted centroid.
    pub y: f64,
    /// Characteristic radius, `sqrt(npix / pi) / 2`.
    pub radius: f64,
    pub npix: usize,
    /// Background-subtracted flux above threshold.
    pub flux: f64,
    pub peak: f32,
}

/// Which image produced the star list of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionOrigin {
    ReferenceStack,
    RawFrame(usize),
}

impl std::fmt::Display for DetectionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReferenceStack => write!(f, "reference stack"),
            Self::RawFrame(i) => write!(f, "frame {i}"),
        }
    }
}

/// Outcome of [`locate_stars`].
#[derive(Clone, Debug)]
pub struct StarSearch {
    pub stars: Vec<DetectedStar>,
    pub origin: DetectionOrigin,
    /// Number of detection attempts made, including the successful one.
    pub attempts: usize,
}

/// Detect stars above `threshold_sigma` times the background RMS.
///
/// Sources are sorted brightest first.
pub fn detect_stars(data: &Array2<f32>, config: &DetectionConfig) -> Vec<DetectedStar> {
    let background = estimate_background(data, config.background_block);
    let threshold = config.threshold_sigma * background.global_rms;
    debug!(
        global_back = background.global_back,
        global_rms = background.global_rms,
        threshold,
        "Background estimated"
    );
    if !(threshold > 0.0) {
        return Vec::new();
    }

    let residual = background.subtract_from(data);
    let mask = residual.mapv(|v| v > threshold);
    let components = connected_components(&mask, &residual);

    let mut stars: Vec<DetectedStar> = components
        .into_iter()
        .filter(|c| c.area >= config.min_area)
        .map(|c| {
            let (x, y) = c.centroid();
            DetectedStar {
                x,
                y,
                radius: (c.area as f64 / PI).sqrt() / 2.0,
                npix: c.area,
                flux: c.flux,
                peak: c.peak,
            }
        })
        .collect();
    stars.sort_by(|a, b| b.flux.total_cmp(&a.flux));
    stars
}

/// Drop stars whose aperture plus `margin` would leave the frame.
pub fn filter_edge_stars(
    stars: Vec<DetectedStar>,
    width: usize,
    height: usize,
    aperture_radius: f64,
    margin: f64,
) -> Vec<DetectedStar> {
    let reach = aperture_radius + margin;
    stars
        .into_iter()
        .filter(|s| {
            s.x - reach > 0.0
                && s.x + reach < width as f64
                && s.y - reach > 0.0
                && s.y + reach < height as f64
        })
        .collect()
}

fn detect_filtered(frame: &Frame, config: &DetectionConfig, aperture_radius: f64) -> Vec<DetectedStar> {
    let found = detect_stars(&frame.data, config);
    let before = found.len();
    let kept = filter_edge_stars(
        found,
        frame.width(),
        frame.height(),
        aperture_radius,
        config.edge_margin,
    );
    debug!(
        detected = before,
        edge_cut = before - kept.len(),
        "Edge filter applied"
    );
    kept
}

/// Find the batch's star list, retrying on raw frames when too few stars
/// are found.
///
/// The reference stack (if any) is tried first, then calibrated raw frames
/// in order starting at frame 1 (frame 0 when there is no stack). The loop
/// is bounded by the frame count; exhausting it is a `NoUsableFrame` error.
/// Frames that fail to decode count as attempts and are passed over.
pub fn locate_stars(
    reference: Option<&Frame>,
    source: &dyn FrameSource,
    calibration: &MasterCalibration,
    config: &DetectionConfig,
    aperture_radius: f64,
    directory: &Path,
) -> Result<StarSearch> {
    let mut attempts = 0;

    if let Some(stack) = reference {
        attempts += 1;
        let stars = detect_filtered(stack, config, aperture_radius);
        info!(stars = stars.len(), "Detected stars in reference stack");
        if stars.len() >= config.min_stars {
            return Ok(StarSearch {
                stars,
                origin: DetectionOrigin::ReferenceStack,
                attempts,
            });
        }
    }

    let first_raw = if reference.is_some() { 1 } else { 0 };
    for index in first_raw..source.len() {
        attempts += 1;
        let frame = match source.read_frame(index).and_then(|raw| calibration.apply(&raw)) {
            Ok(frame) => frame,
            Err(e) if e.is_frame_local() => {
                warn!(frame = index, error = %e, "Unreadable frame, moving to next frame");
                continue;
            }
            Err(e) => return Err(e),
        };
        let stars = detect_filtered(&frame, config, aperture_radius);
        if stars.len() >= config.min_stars {
            info!(stars = stars.len(), frame = index, attempts, "Detected stars in raw frame");
            return Ok(StarSearch {
                stars,
                origin: DetectionOrigin::RawFrame(index),
                attempts,
            });
        }
        info!(
            stars = stars.len(),
            min_stars = config.min_stars,
            frame = index,
            "Too few stars, moving to next frame"
        );
    }

    Err(LightcurveError::NoUsableFrame {
        directory: directory.to_path_buf(),
    })
}
