use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{LightcurveError, Result};
use crate::frame::Frame;

use super::check_dimensions;

/// Stack frames by computing the median at each pixel position.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
/// Parallelizes at the row level for images >= 256x256.
pub fn median_stack(frames: &[Frame]) -> Result<Frame> {
    if frames.is_empty() {
        return Err(LightcurveError::EmptySequence);
    }
    check_dimensions(frames)?;

    let (h, w) = frames[0].data.dim();
    let n = frames.len();

    let result = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        // Row-parallel: each row allocates its own pixel_values
        let rows: Vec<Vec<f32>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut pixel_values = vec![0.0f32; n];
                let mut row_result = vec![0.0f32; w];
                for (col, result) in row_result.iter_mut().enumerate() {
                    for (i, frame) in frames.iter().enumerate() {
                        pixel_values[i] = frame.data[[row, col]];
                    }
                    *result = median_in_place(&mut pixel_values);
                }
                row_result
            })
            .collect();

        Array2::from_shape_fn((h, w), |(row, col)| rows[row][col])
    } else {
        let mut result = Array2::<f32>::zeros((h, w));
        let mut pixel_values = vec![0.0f32; n];

        for row in 0..h {
            for col in 0..w {
                for (i, frame) in frames.iter().enumerate() {
                    pixel_values[i] = frame.data[[row, col]];
                }
                result[[row, col]] = median_in_place(&mut pixel_values);
            }
        }
        result
    };

    Ok(frames[0].with_data(result))
}

/// Median of a slice, reordering it. Even lengths average the two middle values.
/// Returns 0.0 for an empty slice.
pub fn median_in_place(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        0.0
    } else if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Median of all pixels of an image.
pub fn image_median(data: &Array2<f32>) -> f32 {
    let mut values: Vec<f32> = data.iter().copied().collect();
    median_in_place(&mut values)
}
