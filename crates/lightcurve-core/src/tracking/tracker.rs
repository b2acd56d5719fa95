use rayon::prelude::*;
use tracing::debug;

use crate::consts::{FWHM_TO_SIGMA, MIN_CENTROID_SIGMA, PARALLEL_STAR_THRESHOLD};
use crate::error::LightcurveError;
use crate::frame::{DriftVector, Frame, Position};
use crate::pipeline::config::TrackingConfig;

use super::centroid::windowed_centroid;

/// Result of tracking one frame.
#[derive(Clone, Debug)]
pub struct TrackStep {
    /// Field drift applied to every star for this frame.
    pub drift: DriftVector,
    /// Star positions after the drift, index-aligned with the star list.
    pub positions: Vec<Position>,
    /// Whether each star's centroid refinement succeeded on this frame.
    pub refined_valid: Vec<bool>,
}

/// Centroid weight sigma for a set of detection radii.
pub fn tracking_sigma(radii: &[f64]) -> f64 {
    if radii.is_empty() {
        return MIN_CENTROID_SIGMA;
    }
    let mean = radii.iter().sum::<f64>() / radii.len() as f64;
    (mean * 2.0 / FWHM_TO_SIGMA).max(MIN_CENTROID_SIGMA)
}

/// Sequential tracking state for one batch.
///
/// Every star moves by the same drift each frame: stars are refined
/// individually, but only the mean displacement of the successful
/// refinements is applied.
pub struct DriftTracker {
    positions: Vec<Position>,
    sigma: f64,
    params: TrackingConfig,
    history: Vec<DriftVector>,
}

impl DriftTracker {
    pub fn new(initial: Vec<Position>, radii: &[f64], params: TrackingConfig) -> Self {
        Self {
            positions: initial,
            sigma: tracking_sigma(radii),
            params,
            history: Vec::new(),
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Positions that will seed the next frame.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Per-frame drift recorded so far, one entry per `step` or `skip`.
    pub fn history(&self) -> &[DriftVector] {
        &self.history
    }

    pub fn into_history(self) -> Vec<DriftVector> {
        self.history
    }

    /// Refine every star on `frame`, then move all stars by the mean
    /// displacement of the successful refinements.
    pub fn step(&mut self, frame: &Frame) -> TrackStep {
        let refine = |p: &Position| windowed_centroid(&frame.data, p.x, p.y, self.sigma, &self.params);
        let refined: Vec<Option<(f64, f64)>> = if self.positions.len() >= PARALLEL_STAR_THRESHOLD {
            self.positions.par_iter().map(refine).collect()
        } else {
            self.positions.iter().map(refine).collect()
        };

        let mut sum_dx = 0.0;
        let mut sum_dy = 0.0;
        let mut good = 0usize;
        for (prev, r) in self.positions.iter().zip(&refined) {
            if let Some((x, y)) = r {
                sum_dx += x - prev.x;
                sum_dy += y - prev.y;
                good += 1;
            }
        }
        let drift = if good > 0 {
            DriftVector {
                dx: sum_dx / good as f64,
                dy: sum_dy / good as f64,
            }
        } else {
            DriftVector::default()
        };

        let refined_valid: Vec<bool> = refined.iter().map(Option::is_some).collect();
        for (star, _) in refined_valid.iter().enumerate().filter(|(_, ok)| !**ok) {
            let err = LightcurveError::TrackingDegeneracy {
                star,
                frame: frame.metadata.frame_index,
            };
            debug!("{err}");
        }

        for p in &mut self.positions {
            *p = p.offset(drift);
        }
        self.history.push(drift);

        TrackStep {
            drift,
            positions: self.positions.clone(),
            refined_valid,
        }
    }

    /// Record a zero drift for a frame that could not be decoded.
    pub fn skip(&mut self) -> DriftVector {
        let drift = DriftVector::default();
        self.history.push(drift);
        drift
    }
}
