//! Iterative Gaussian-windowed centroid.
//!
//! Each iteration weights pixels inside a circular window of radius
//! `window_scale * sigma` by `exp(-r^2 / 2 sigma^2)` and moves the estimate by
//! twice the weighted mean offset. Pixels straddling the window edge are
//! sub-sampled on a `subpix x subpix` grid so the window boundary is smooth
//! under sub-pixel motion.

use ndarray::Array2;

use crate::consts::CENTROID_CONVERGENCE;
use crate::pipeline::config::TrackingConfig;

/// Half the diagonal of a unit pixel.
const PIXEL_HALF_DIAGONAL: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Refine `(x, y)` on `data`.
///
/// Returns `None` when the weighted intensity in the window is not positive,
/// when the window leaves the image, or when the estimate stops being finite.
pub fn windowed_centroid(
    data: &Array2<f32>,
    x: f64,
    y: f64,
    sigma: f64,
    params: &TrackingConfig,
) -> Option<(f64, f64)> {
    if !(sigma > 0.0) || !x.is_finite() || !y.is_finite() {
        return None;
    }

    let radius = params.window_scale * sigma;
    let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);
    let subpix = params.subpix.max(1);

    let mut cx = x;
    let mut cy = y;
    for _ in 0..params.max_iterations.max(1) {
        let (sum_w, sum_dx, sum_dy) = window_moments(data, cx, cy, radius, inv_two_sigma2, subpix)?;
        if sum_w <= 0.0 {
            return None;
        }
        let step_x = 2.0 * sum_dx / sum_w;
        let step_y = 2.0 * sum_dy / sum_w;
        cx += step_x;
        cy += step_y;
        if !cx.is_finite() || !cy.is_finite() {
            return None;
        }
        if step_x * step_x + step_y * step_y < CENTROID_CONVERGENCE {
            break;
        }
    }
    Some((cx, cy))
}

/// `(sum wI, sum wI dx, sum wI dy)` over the window centered at `(cx, cy)`.
fn window_moments(
    data: &Array2<f32>,
    cx: f64,
    cy: f64,
    radius: f64,
    inv_two_sigma2: f64,
    subpix: usize,
) -> Option<(f64, f64, f64)> {
    let (h, w) = data.dim();
    let r_in = (radius - PIXEL_HALF_DIAGONAL).max(0.0);
    let r_out = radius + PIXEL_HALF_DIAGONAL;
    let r_in2 = r_in * r_in;
    let r_out2 = r_out * r_out;
    let r2_limit = radius * radius;

    let col_min = (cx - r_out).floor();
    let col_max = (cx + r_out).ceil();
    let row_min = (cy - r_out).floor();
    let row_max = (cy + r_out).ceil();
    if col_min < 0.0 || row_min < 0.0 || col_max > (w as f64 - 1.0) || row_max > (h as f64 - 1.0) {
        return None;
    }

    let step = 1.0 / subpix as f64;
    let mut sum_w = 0.0f64;
    let mut sum_dx = 0.0f64;
    let mut sum_dy = 0.0f64;

    for row in row_min as usize..=row_max as usize {
        let dy = row as f64 - cy;
        for col in col_min as usize..=col_max as usize {
            let dx = col as f64 - cx;
            let r2 = dx * dx + dy * dy;
            if r2 >= r_out2 {
                continue;
            }

            let coverage = if r2 > r_in2 {
                let mut inside = 0usize;
                for sy in 0..subpix {
                    let oy = dy - 0.5 + (sy as f64 + 0.5) * step;
                    for sx in 0..subpix {
                        let ox = dx - 0.5 + (sx as f64 + 0.5) * step;
                        if ox * ox + oy * oy < r2_limit {
                            inside += 1;
                        }
                    }
                }
                inside as f64 / (subpix * subpix) as f64
            } else {
                1.0
            };
            if coverage == 0.0 {
                continue;
            }

            let weighted = data[[row, col]] as f64 * (-r2 * inv_two_sigma2).exp() * coverage;
            sum_w += weighted;
            sum_dx += weighted * dx;
            sum_dy += weighted * dy;
        }
    }

    Some((sum_w, sum_dx, sum_dy))
}
