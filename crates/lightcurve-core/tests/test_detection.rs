#[allow(dead_code)]
mod common;

use std::path::Path;

use ndarray::Array2;

use lightcurve_core::calibration::MasterCalibration;
use lightcurve_core::detection::background::{clipped_stddev, estimate_background};
use lightcurve_core::detection::components::connected_components;
use lightcurve_core::detection::{
    detect_stars, filter_edge_stars, locate_stars, DetectedStar, DetectionConfig, DetectionOrigin,
};
use lightcurve_core::error::LightcurveError;
use lightcurve_core::frame::Frame;

use common::{MemorySource, SynthStar};

fn three_stars() -> Vec<SynthStar> {
    vec![
        SynthStar::new(40.3, 50.7, 40000.0),
        SynthStar::new(85.2, 30.4, 30000.0),
        SynthStar::new(70.6, 90.1, 50000.0),
    ]
}

fn detection_config(min_stars: usize) -> DetectionConfig {
    DetectionConfig {
        min_stars,
        ..DetectionConfig::default()
    }
}

fn star_at(x: f64, y: f64) -> DetectedStar {
    DetectedStar {
        x,
        y,
        radius: 2.0,
        npix: 50,
        flux: 1000.0,
        peak: 100.0,
    }
}

fn flat_frame(index: usize) -> Frame {
    common::frame_with_time(Array2::from_elem((128, 128), 100.0), index)
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

#[test]
fn test_background_of_flat_sky() {
    let data = common::star_field(128, 128, 250.0, 4.0, &[], 7);
    let bg = estimate_background(&data, 64);
    assert!((bg.global_back - 250.0).abs() < 1.0, "{}", bg.global_back);
    assert!((bg.global_rms - 4.0).abs() < 0.4, "{}", bg.global_rms);
}

#[test]
fn test_background_follows_gradient() {
    let data = Array2::from_shape_fn((128, 128), |(_, c)| 100.0 + c as f32);
    let bg = estimate_background(&data, 32);
    let residual = bg.subtract_from(&data);
    // Interior pixels are well inside the block-center grid.
    for col in 24..104 {
        assert!(residual[[64, col]].abs() < 1.0, "col {col}: {}", residual[[64, col]]);
    }
}

#[test]
fn test_clipped_stddev_ignores_outliers() {
    let mut values: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    values.push(1000.0);
    let sigma = clipped_stddev(values, 3.0, 5);
    assert!((sigma - 1.0).abs() < 0.01, "{sigma}");
}

// ---------------------------------------------------------------------------
// Connected components
// ---------------------------------------------------------------------------

#[test]
fn test_components_four_connectivity() {
    let mut mask = Array2::from_elem((5, 5), false);
    mask[[0, 0]] = true;
    mask[[0, 1]] = true;
    // Diagonal neighbour only: separate component.
    mask[[1, 2]] = true;
    mask[[3, 3]] = true;
    mask[[4, 3]] = true;
    mask[[3, 4]] = true;
    let values = Array2::from_elem((5, 5), 1.0f32);

    let comps = connected_components(&mask, &values);
    assert_eq!(comps.len(), 3);
    assert_eq!(comps[0].area, 3);
    assert_eq!(comps[0].bbox, (3, 4, 3, 4));
}

#[test]
fn test_component_weighted_centroid() {
    let mask = Array2::from_elem((1, 3), true);
    let values = Array2::from_shape_vec((1, 3), vec![1.0f32, 2.0, 1.0]).unwrap();
    let comps = connected_components(&mask, &values);
    assert_eq!(comps.len(), 1);
    assert_eq!(comps[0].centroid(), (1.0, 0.0));
    assert_eq!(comps[0].peak, 2.0);
}

#[test]
fn test_u_shape_merges_into_one_component() {
    let mut mask = Array2::from_elem((3, 3), false);
    for r in 0..3 {
        mask[[r, 0]] = true;
        mask[[r, 2]] = true;
    }
    mask[[2, 1]] = true;
    let comps = connected_components(&mask, &Array2::ones((3, 3)));
    assert_eq!(comps.len(), 1);
    assert_eq!(comps[0].area, 7);
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[test]
fn test_detect_stars_positions_and_order() {
    let data = common::star_field(128, 128, 100.0, 3.0, &three_stars(), 11);
    let stars = detect_stars(&data, &DetectionConfig::default());
    assert_eq!(stars.len(), 3);

    // Brightest first.
    let expected = [(70.6, 90.1), (40.3, 50.7), (85.2, 30.4)];
    for (star, (x, y)) in stars.iter().zip(expected) {
        assert!((star.x - x).abs() < 0.15, "x {} vs {x}", star.x);
        assert!((star.y - y).abs() < 0.15, "y {} vs {y}", star.y);
        assert!(star.radius > 1.0 && star.radius < 5.0, "radius {}", star.radius);
        assert!(star.npix >= DetectionConfig::default().min_area);
    }
    assert!(stars[0].flux > stars[1].flux && stars[1].flux > stars[2].flux);
}

#[test]
fn test_detect_stars_on_flat_image_is_empty() {
    let data = Array2::from_elem((64, 64), 500.0f32);
    assert!(detect_stars(&data, &DetectionConfig::default()).is_empty());
}

#[test]
fn test_higher_threshold_finds_fewer_stars() {
    let mut stars = three_stars();
    stars.push(SynthStar::new(30.0, 100.0, 400.0));
    let data = common::star_field(128, 128, 100.0, 3.0, &stars, 5);

    let low = detect_stars(&data, &DetectionConfig::default());
    let high = detect_stars(
        &data,
        &DetectionConfig {
            threshold_sigma: 20.0,
            ..DetectionConfig::default()
        },
    );
    assert_eq!(low.len(), 4);
    assert_eq!(high.len(), 3);
}

#[test]
fn test_edge_filter_keeps_only_interior_stars() {
    let stars = vec![
        star_at(50.0, 50.0),
        star_at(6.9, 50.0),
        star_at(50.0, 93.5),
        star_at(7.5, 92.5),
    ];
    // Reach is 4 + 3 = 7 on a 100 x 100 frame.
    let kept = filter_edge_stars(stars, 100, 100, 4.0, 3.0);
    assert_eq!(kept.len(), 2);
    assert_eq!((kept[0].x, kept[0].y), (50.0, 50.0));
    assert_eq!((kept[1].x, kept[1].y), (7.5, 92.5));
}

// ---------------------------------------------------------------------------
// Bounded retry
// ---------------------------------------------------------------------------

#[test]
fn test_locate_uses_reference_when_it_has_enough_stars() {
    let frames = common::star_sequence(6, (128, 128), &three_stars(), 3.0, (0.0, 0.0));
    let reference = frames[0].clone();
    let source = MemorySource::new(frames);

    let search = locate_stars(
        Some(&reference),
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(3),
        8.0,
        Path::new("batch"),
    )
    .unwrap();
    assert_eq!(search.origin, DetectionOrigin::ReferenceStack);
    assert_eq!(search.attempts, 1);
    assert_eq!(search.stars.len(), 3);
}

#[test]
fn test_locate_retries_on_frame_one_after_empty_stack() {
    let frames = common::star_sequence(6, (128, 128), &three_stars(), 3.0, (0.0, 0.0));
    let source = MemorySource::new(frames);

    let search = locate_stars(
        Some(&flat_frame(0)),
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(3),
        8.0,
        Path::new("batch"),
    )
    .unwrap();
    assert_eq!(search.origin, DetectionOrigin::RawFrame(1));
    assert_eq!(search.attempts, 2);
    assert_eq!(search.origin.to_string(), "frame 1");
}

#[test]
fn test_locate_without_stack_starts_at_frame_zero() {
    let mut frames = common::star_sequence(6, (128, 128), &three_stars(), 3.0, (0.0, 0.0));
    frames[0] = flat_frame(0);
    frames[1] = flat_frame(1);
    let source = MemorySource::new(frames);

    let search = locate_stars(
        None,
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(3),
        8.0,
        Path::new("batch"),
    )
    .unwrap();
    assert_eq!(search.origin, DetectionOrigin::RawFrame(2));
    assert_eq!(search.attempts, 3);
}

#[test]
fn test_locate_passes_over_unreadable_retry_frame() {
    let frames = common::star_sequence(6, (128, 128), &three_stars(), 3.0, (0.0, 0.0));
    let mut source = MemorySource::new(frames);
    source.frames[1] = None;

    let search = locate_stars(
        Some(&flat_frame(0)),
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(3),
        8.0,
        Path::new("batch"),
    )
    .unwrap();
    assert_eq!(search.origin, DetectionOrigin::RawFrame(2));
    assert_eq!(search.attempts, 3);
    assert_eq!(search.stars.len(), 3);
}

#[test]
fn test_locate_with_only_unreadable_frames_has_no_usable_frame() {
    let mut source = MemorySource::new((0..3).map(flat_frame).collect());
    for slot in source.frames.iter_mut() {
        *slot = None;
    }
    let err = locate_stars(
        None,
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(1),
        4.0,
        Path::new("batch"),
    )
    .unwrap_err();
    assert!(matches!(err, LightcurveError::NoUsableFrame { .. }));
}

#[test]
fn test_locate_exhausts_frames() {
    let source = MemorySource::new((0..4).map(flat_frame).collect());
    let err = locate_stars(
        None,
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(1),
        4.0,
        Path::new("night/batch_7"),
    )
    .unwrap_err();
    match err {
        LightcurveError::NoUsableFrame { directory } => {
            assert_eq!(directory, Path::new("night/batch_7"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_locate_requires_min_stars_after_edge_cut() {
    let stars = vec![
        SynthStar::new(64.0, 64.0, 40000.0),
        SynthStar::new(5.0, 64.0, 40000.0),
    ];
    let frames = common::star_sequence(3, (128, 128), &stars, 3.0, (0.0, 0.0));
    let source = MemorySource::new(frames);
    // Two stars are detected but only one survives the edge filter.
    let err = locate_stars(
        None,
        &source,
        &MasterCalibration::zero(128, 128),
        &detection_config(2),
        4.0,
        Path::new("batch"),
    )
    .unwrap_err();
    assert!(matches!(err, LightcurveError::NoUsableFrame { .. }));
}
