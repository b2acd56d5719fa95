//! Smooth sky background and global noise estimate.
//!
//! The image is tiled into square blocks; each block contributes its median.
//! Block medians are bilinearly interpolated between block centers into a
//! full-resolution background map. The global RMS is the sigma-clipped
//! standard deviation of the background-subtracted image.

use ndarray::Array2;

use crate::consts::{BACKGROUND_CLIP_ITERATIONS, BACKGROUND_CLIP_SIGMA};
use crate::stack::median::median_in_place;

#[derive(Clone, Debug)]
pub struct Background {
    /// Background level at every pixel.
    pub level: Array2<f32>,
    /// Mean of the background map.
    pub global_back: f32,
    /// Noise of the background-subtracted image.
    pub global_rms: f32,
}

impl Background {
    /// `data - level`.
    pub fn subtract_from(&self, data: &Array2<f32>) -> Array2<f32> {
        data - &self.level
    }
}

/// Estimate the background mesh and global RMS of `data`.
pub fn estimate_background(data: &Array2<f32>, block_size: usize) -> Background {
    let (h, w) = data.dim();
    let bs = block_size.max(1);
    let nx = w.div_ceil(bs).max(1);
    let ny = h.div_ceil(bs).max(1);

    let mut block_medians = vec![0.0f32; nx * ny];
    let mut vals: Vec<f32> = Vec::with_capacity(bs * bs);
    for by in 0..ny {
        for bx in 0..nx {
            vals.clear();
            for row in by * bs..((by + 1) * bs).min(h) {
                for col in bx * bs..((bx + 1) * bs).min(w) {
                    let v = data[[row, col]];
                    if v.is_finite() {
                        vals.push(v);
                    }
                }
            }
            block_medians[by * nx + bx] = median_in_place(&mut vals);
        }
    }

    let half_bs = bs as f32 / 2.0;
    let level = Array2::from_shape_fn((h, w), |(row, col)| {
        let bx_f = (col as f32 - half_bs + 0.5) / bs as f32;
        let by_f = (row as f32 - half_bs + 0.5) / bs as f32;

        let bx0 = (bx_f.floor().max(0.0) as usize).min(nx - 1);
        let by0 = (by_f.floor().max(0.0) as usize).min(ny - 1);
        let bx1 = (bx0 + 1).min(nx - 1);
        let by1 = (by0 + 1).min(ny - 1);

        let fx = (bx_f - bx0 as f32).clamp(0.0, 1.0);
        let fy = (by_f - by0 as f32).clamp(0.0, 1.0);

        let m00 = block_medians[by0 * nx + bx0];
        let m10 = block_medians[by0 * nx + bx1];
        let m01 = block_medians[by1 * nx + bx0];
        let m11 = block_medians[by1 * nx + bx1];

        if m00 == m10 && m00 == m01 && m00 == m11 {
            return m00;
        }
        m00 * (1.0 - fx) * (1.0 - fy) + m10 * fx * (1.0 - fy) + m01 * (1.0 - fx) * fy + m11 * fx * fy
    });

    let global_back = if level.is_empty() {
        0.0
    } else {
        (level.iter().map(|&v| v as f64).sum::<f64>() / level.len() as f64) as f32
    };

    let residual: Vec<f32> = data
        .iter()
        .zip(level.iter())
        .map(|(&v, &b)| v - b)
        .filter(|v| v.is_finite())
        .collect();
    let (_, raw_rms) = mean_stddev(&residual);
    let mut global_rms =
        clipped_stddev(residual, BACKGROUND_CLIP_SIGMA, BACKGROUND_CLIP_ITERATIONS);
    // Noise-free synthetic skies clip down to zero; keep the unclipped spread.
    if global_rms <= 0.0 {
        global_rms = raw_rms as f32;
    }

    Background {
        level,
        global_back,
        global_rms,
    }
}

/// Standard deviation after iterative `kappa`-sigma clipping about the mean.
pub fn clipped_stddev(mut values: Vec<f32>, kappa: f32, iterations: usize) -> f32 {
    let mut sigma = 0.0f64;
    for _ in 0..iterations.max(1) {
        if values.is_empty() {
            return 0.0;
        }
        let (mean, std) = mean_stddev(&values);
        sigma = std;
        if std < 1e-10 {
            break;
        }
        let lo = (mean - kappa as f64 * std) as f32;
        let hi = (mean + kappa as f64 * std) as f32;
        let before = values.len();
        values.retain(|&v| v >= lo && v <= hi);
        if values.len() == before {
            break;
        }
    }
    if !values.is_empty() {
        sigma = mean_stddev(&values).1;
    }
    sigma as f32
}

/// Mean and population standard deviation.
pub fn mean_stddev(values: &[f32]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
