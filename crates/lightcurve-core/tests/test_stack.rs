#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use lightcurve_core::calibration::MasterCalibration;
use lightcurve_core::error::LightcurveError;
use lightcurve_core::frame::Frame;
use lightcurve_core::pipeline::config::{StackMethod, StackingConfig};
use lightcurve_core::stack::mean::{mean_stack, StreamingMeanStacker};
use lightcurve_core::stack::median::{image_median, median_in_place, median_stack};
use lightcurve_core::stack::reference::stack_reference;

use common::MemorySource;

/// Frame `i` is uniformly `i`.
fn ramp_source(count: usize) -> MemorySource {
    MemorySource::new(
        (0..count)
            .map(|i| common::frame_with_time(Array2::from_elem((4, 5), i as f32), i))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Median
// ---------------------------------------------------------------------------

#[test]
fn test_median_in_place_odd_even_empty() {
    assert_eq!(median_in_place(&mut [3.0, 1.0, 2.0]), 2.0);
    assert_eq!(median_in_place(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    assert_eq!(median_in_place(&mut [7.0]), 7.0);
    assert_eq!(median_in_place(&mut []), 0.0);
}

#[test]
fn test_median_stack_rejects_outlier() {
    let mut frames: Vec<Frame> = (0..5)
        .map(|_| Frame::new(Array2::from_elem((3, 3), 10.0), 12))
        .collect();
    frames[2].data[[1, 1]] = 4000.0;
    let stacked = median_stack(&frames).unwrap();
    assert_eq!(stacked.data[[1, 1]], 10.0);
}

#[test]
fn test_median_stack_large_frame_matches_small_path() {
    // 256x256 takes the row-parallel path.
    let frames: Vec<Frame> = (0..3)
        .map(|k| {
            Frame::new(
                Array2::from_shape_fn((256, 256), |(r, c)| (r + c + k * 7) as f32),
                12,
            )
        })
        .collect();
    let stacked = median_stack(&frames).unwrap();
    assert_eq!(stacked.data[[0, 0]], 7.0);
    assert_eq!(stacked.data[[255, 255]], 517.0);
}

#[test]
fn test_median_stack_empty_and_mismatch() {
    assert!(matches!(median_stack(&[]), Err(LightcurveError::EmptySequence)));
    let frames = vec![
        Frame::new(Array2::zeros((2, 2)), 12),
        Frame::new(Array2::zeros((2, 3)), 12),
    ];
    assert!(matches!(
        median_stack(&frames),
        Err(LightcurveError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_image_median() {
    let data = Array2::from_shape_vec((2, 2), vec![5.0, 1.0, 9.0, 3.0]).unwrap();
    assert_eq!(image_median(&data), 4.0);
}

// ---------------------------------------------------------------------------
// Mean
// ---------------------------------------------------------------------------

#[test]
fn test_mean_stack_values_and_metadata() {
    let frames: Vec<Frame> = (0..4)
        .map(|i| common::frame_with_time(Array2::from_elem((2, 2), i as f32), i))
        .collect();
    let stacked = mean_stack(&frames).unwrap();
    assert!(stacked.data.iter().all(|&v| v == 1.5));
    assert_eq!(stacked.metadata.timestamp, frames[0].metadata.timestamp);
}

#[test]
fn test_streaming_mean_matches_batch_mean() {
    let frames: Vec<Frame> = (0..6)
        .map(|i| {
            Frame::new(
                Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32 * (i as f32 + 1.0)),
                12,
            )
        })
        .collect();
    let mut stacker = StreamingMeanStacker::new(3, 4);
    for f in &frames {
        stacker.add(f).unwrap();
    }
    assert_eq!(stacker.count(), 6);
    let streamed = stacker.finalize().unwrap();
    let batch = mean_stack(&frames).unwrap();
    for (a, b) in streamed.data.iter().zip(batch.data.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
    }
}

#[test]
fn test_streaming_mean_rejects_shape_and_empty() {
    let mut stacker = StreamingMeanStacker::new(2, 2);
    assert!(stacker.add(&Frame::new(Array2::zeros((3, 2)), 12)).is_err());
    assert!(matches!(
        stacker.finalize(),
        Err(LightcurveError::EmptySequence)
    ));
}

// ---------------------------------------------------------------------------
// Reference stack window
// ---------------------------------------------------------------------------

#[test]
fn test_reference_uses_configured_window() {
    let source = ramp_source(20);
    let calibration = MasterCalibration::zero(4, 5);
    let config = StackingConfig::default();

    let stack = stack_reference(&source, &calibration, &config)
        .unwrap()
        .unwrap();
    // Mean of frames 2..12.
    assert!(stack.data.iter().all(|&v| (v - 6.5).abs() < 1e-6));
    assert_eq!(stack.metadata.frame_index, 2);
}

#[test]
fn test_reference_median_method() {
    let source = ramp_source(20);
    let calibration = MasterCalibration::zero(4, 5);
    let config = StackingConfig {
        start: 0,
        count: 5,
        method: StackMethod::Median,
        ..StackingConfig::default()
    };
    let stack = stack_reference(&source, &calibration, &config)
        .unwrap()
        .unwrap();
    assert!(stack.data.iter().all(|&v| v == 2.0));
}

#[test]
fn test_reference_applies_calibration() {
    let source = ramp_source(12);
    let calibration = MasterCalibration::from_bias(Frame::new(Array2::from_elem((4, 5), 1.0), 12));
    let stack = stack_reference(&source, &calibration, &StackingConfig::default())
        .unwrap()
        .unwrap();
    assert!(stack.data.iter().all(|&v| (v - 5.5).abs() < 1e-6));
}

#[test]
fn test_short_batch_has_no_reference() {
    let calibration = MasterCalibration::zero(4, 5);
    // The default window needs frames 0..12.
    let stack = stack_reference(&ramp_source(11), &calibration, &StackingConfig::default()).unwrap();
    assert!(stack.is_none());

    let config = StackingConfig {
        min_source_frames: 100,
        ..StackingConfig::default()
    };
    let stack = stack_reference(&ramp_source(20), &calibration, &config).unwrap();
    assert!(stack.is_none());
}

#[test]
fn test_zero_count_disables_stacking() {
    let config = StackingConfig {
        count: 0,
        ..StackingConfig::default()
    };
    let stack = stack_reference(&ramp_source(20), &MasterCalibration::zero(4, 5), &config).unwrap();
    assert!(stack.is_none());
}

#[test]
fn test_reference_skips_corrupt_frame_in_window() {
    let mut source = ramp_source(20);
    source.frames[4] = None;
    let stack = stack_reference(&source, &MasterCalibration::zero(4, 5), &StackingConfig::default())
        .unwrap()
        .unwrap();
    // Frames 2..12 without frame 4: (65 - 4) / 9.
    assert!(stack.data.iter().all(|&v| (v - 61.0 / 9.0).abs() < 1e-5));
    assert_eq!(stack.metadata.frame_index, 2);
}

#[test]
fn test_reference_median_skips_corrupt_frames() {
    let mut source = ramp_source(10);
    source.frames[1] = None;
    source.frames[3] = None;
    let config = StackingConfig {
        start: 0,
        count: 5,
        method: StackMethod::Median,
        ..StackingConfig::default()
    };
    let stack = stack_reference(&source, &MasterCalibration::zero(4, 5), &config)
        .unwrap()
        .unwrap();
    // Median of frames 0, 2 and 4.
    assert!(stack.data.iter().all(|&v| v == 2.0));
}

#[test]
fn test_reference_with_too_few_decodable_frames_is_none() {
    let mut source = ramp_source(20);
    for i in 3..12 {
        source.frames[i] = None;
    }
    let calibration = MasterCalibration::zero(4, 5);
    let stack = stack_reference(&source, &calibration, &StackingConfig::default()).unwrap();
    assert!(stack.is_none());

    let config = StackingConfig {
        method: StackMethod::Median,
        ..StackingConfig::default()
    };
    assert!(stack_reference(&source, &calibration, &config).unwrap().is_none());
}
