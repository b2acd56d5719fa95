//! Circular-aperture photometry with a local annulus background.

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_STAR_THRESHOLD;
use crate::frame::{Frame, Position};
use crate::pipeline::config::PhotometryConfig;

const PIXEL_HALF_DIAGONAL: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Flux measured through one aperture.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ApertureFlux {
    /// Background-subtracted sum.
    pub flux: f64,
    pub flux_error: f64,
    /// Effective aperture area in pixels.
    pub area: f64,
    /// Mean annulus level per pixel.
    pub background: f64,
    /// `false` when the star was excluded near the frame edge.
    pub valid: bool,
}

impl ApertureFlux {
    /// The zero-flux placeholder used for excluded stars.
    pub fn excluded() -> Self {
        Self::default()
    }
}

/// Indices of positions closer than `margin` to any edge.
pub fn edge_exclusions(positions: &[Position], width: usize, height: usize, margin: f64) -> Vec<usize> {
    let w = width as f64;
    let h = height as f64;
    positions
        .iter()
        .enumerate()
        .filter(|(_, p)| p.x < margin || p.x >= w - margin || p.y < margin || p.y >= h - margin)
        .map(|(i, _)| i)
        .collect()
}

/// Fraction of the unit pixel at offset `(dx, dy)` lying inside radius `r`.
fn pixel_coverage(dx: f64, dy: f64, r: f64, subpix: usize) -> f64 {
    let d2 = dx * dx + dy * dy;
    let inner = (r - PIXEL_HALF_DIAGONAL).max(0.0);
    let outer = r + PIXEL_HALF_DIAGONAL;
    if d2 <= inner * inner {
        return 1.0;
    }
    if d2 >= outer * outer {
        return 0.0;
    }
    let step = 1.0 / subpix as f64;
    let r2 = r * r;
    let mut inside = 0usize;
    for sy in 0..subpix {
        let oy = dy - 0.5 + (sy as f64 + 0.5) * step;
        for sx in 0..subpix {
            let ox = dx - 0.5 + (sx as f64 + 0.5) * step;
            if ox * ox + oy * oy < r2 {
                inside += 1;
            }
        }
    }
    inside as f64 / (subpix * subpix) as f64
}

/// Sum a circular aperture of radius `r` at `(x, y)`.
///
/// The background is the mean of whole pixels whose centers fall in the
/// annulus `[r + inner, r + outer)`. Pixels outside the image contribute
/// nothing to either sum.
pub fn sum_circle(data: &Array2<f32>, x: f64, y: f64, r: f64, params: &PhotometryConfig) -> ApertureFlux {
    let (h, w) = data.dim();
    let subpix = params.subpix.max(1);
    let ann_in = r + params.annulus_inner;
    let ann_out = r + params.annulus_outer;
    let reach = ann_out.max(r + PIXEL_HALF_DIAGONAL);

    let row_lo = (y - reach).floor().max(0.0) as usize;
    let col_lo = (x - reach).floor().max(0.0) as usize;
    let row_hi = ((y + reach).ceil().max(0.0) as usize).min(h.saturating_sub(1));
    let col_hi = ((x + reach).ceil().max(0.0) as usize).min(w.saturating_sub(1));

    let mut aperture_sum = 0.0f64;
    let mut area = 0.0f64;
    let mut ann_sum = 0.0f64;
    let mut ann_sum2 = 0.0f64;
    let mut ann_n = 0usize;

    if h > 0 && w > 0 {
        for row in row_lo..=row_hi {
            let dy = row as f64 - y;
            for col in col_lo..=col_hi {
                let dx = col as f64 - x;
                let value = data[[row, col]] as f64;
                if !value.is_finite() {
                    continue;
                }

                let coverage = pixel_coverage(dx, dy, r, subpix);
                if coverage > 0.0 {
                    aperture_sum += value * coverage;
                    area += coverage;
                }

                let d = (dx * dx + dy * dy).sqrt();
                if d >= ann_in && d < ann_out {
                    ann_sum += value;
                    ann_sum2 += value * value;
                    ann_n += 1;
                }
            }
        }
    }

    let (background, bkg_var) = if ann_n > 0 {
        let n = ann_n as f64;
        let mean = ann_sum / n;
        (mean, (ann_sum2 / n - mean * mean).max(0.0))
    } else {
        (0.0, 0.0)
    };

    let flux = aperture_sum - background * area;
    let mut variance = area * bkg_var;
    if ann_n > 0 {
        variance += area * area * bkg_var / ann_n as f64;
    }
    if let Some(gain) = params.gain.filter(|g| *g > 0.0) {
        if flux > 0.0 {
            variance += flux / gain;
        }
    }

    ApertureFlux {
        flux,
        flux_error: variance.sqrt(),
        area,
        background,
        valid: true,
    }
}

/// Measure every position on `frame`, index-aligned with `positions`.
///
/// Positions inside the edge margin get [`ApertureFlux::excluded`].
pub fn measure(frame: &Frame, positions: &[Position], config: &PhotometryConfig) -> Vec<ApertureFlux> {
    let excluded = edge_exclusions(positions, frame.width(), frame.height(), config.edge_margin);
    let one = |(i, p): (usize, &Position)| {
        if excluded.binary_search(&i).is_ok() {
            ApertureFlux::excluded()
        } else {
            sum_circle(&frame.data, p.x, p.y, config.aperture_radius, config)
        }
    };

    if positions.len() >= PARALLEL_STAR_THRESHOLD {
        positions.par_iter().enumerate().map(one).collect()
    } else {
        positions.iter().enumerate().map(one).collect()
    }
}
