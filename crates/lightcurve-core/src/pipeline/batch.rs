use std::path::{Path, PathBuf};
use std::sync::mpsc::sync_channel;

use tracing::{info, warn};

use crate::archive::write_batch;
use crate::calibration::{load_calibration, MasterCalibration};
use crate::detection::locate_stars;
use crate::error::{LightcurveError, Result};
use crate::frame::{Frame, Position};
use crate::io::fits::write_fits_f32;
use crate::io::source::{FileFrameSource, FrameSource};
use crate::photometry::measure;
use crate::quality::{classify, LightCurveStats};
use crate::stack::reference::stack_reference;
use crate::tracking::DriftTracker;

use super::config::PipelineConfig;
use super::types::{
    BatchFailure, BatchResult, LightCurve, PhotometrySample, PipelineStage, ProgressReporter,
    StarRecord,
};

type StageResult<T> = std::result::Result<T, BatchFailure>;

/// Directory name of a batch, used to label logs, progress and archives.
pub fn batch_name(directory: &Path) -> String {
    directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| directory.display().to_string())
}

/// Run stacking, detection, tracking, photometry and classification over
/// one batch of frames.
///
/// Frames are decoded and calibrated on a prefetch thread, backed by a
/// batch-private rayon pool, and consumed in order; at most
/// `runtime.prefetch_depth` decoded frames are buffered.
pub fn process_batch(
    source: &dyn FrameSource,
    calibration: &MasterCalibration,
    config: &PipelineConfig,
    directory: &Path,
    reporter: &dyn ProgressReporter,
) -> StageResult<BatchResult> {
    let name = batch_name(directory);
    let total = source.len();
    if total == 0 {
        return Err(BatchFailure {
            stage: PipelineStage::Stacking,
            error: LightcurveError::NoUsableFrame {
                directory: directory.to_path_buf(),
            },
        });
    }

    reporter.begin_stage(&name, PipelineStage::Stacking, Some(config.stacking.count));
    let reference = stack_reference(source, calibration, &config.stacking)
        .map_err(BatchFailure::at(PipelineStage::Stacking))?;
    reporter.finish_stage(&name);
    if reference.is_none() {
        info!(batch = %name, frames = total, "Batch too short to stack, detecting on raw frames");
    }

    reporter.begin_stage(&name, PipelineStage::Detecting, None);
    let search = locate_stars(
        reference.as_ref(),
        source,
        calibration,
        &config.detection,
        config.photometry.aperture_radius,
        directory,
    )
    .map_err(BatchFailure::at(PipelineStage::Detecting))?;
    reporter.finish_stage(&name);
    info!(
        batch = %name,
        stars = search.stars.len(),
        origin = %search.origin,
        attempts = search.attempts,
        "Stars located"
    );

    let mut stars: Vec<StarRecord> = search
        .stars
        .iter()
        .enumerate()
        .map(|(index, s)| StarRecord {
            index,
            initial: Position::new(s.x, s.y),
            radius: s.radius,
            position: Position::new(s.x, s.y),
        })
        .collect();
    let radii: Vec<f64> = stars.iter().map(|s| s.radius).collect();
    let mut tracker = DriftTracker::new(
        stars.iter().map(|s| s.position).collect(),
        &radii,
        config.tracking.clone(),
    );

    reporter.begin_stage(&name, PipelineStage::Tracking, Some(total));
    let mut series: Vec<Vec<PhotometrySample>> = vec![Vec::with_capacity(total); stars.len()];
    let mut frame_names = Vec::with_capacity(total);
    let mut timestamps = Vec::with_capacity(total);
    let mut skipped_frames = 0usize;

    // The tracker below may run on a global-pool worker blocked in `recv`,
    // so parallel decoding must not wait on that pool.
    let decode_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.runtime.decode_threads.max(1))
        .thread_name(|i| format!("lightcurve-decode-{i}"))
        .build()
        .map_err(|e| BatchFailure {
            stage: PipelineStage::Tracking,
            error: LightcurveError::Config(format!("Cannot start decode pool: {e}")),
        })?;

    let tracked: Result<()> = std::thread::scope(|scope| {
        let (tx, rx) = sync_channel::<(usize, Result<Frame>)>(config.runtime.prefetch_depth.max(1));
        let decode_pool = &decode_pool;
        scope.spawn(move || {
            for index in 0..total {
                let decoded = decode_pool.install(|| {
                    source
                        .read_frame(index)
                        .and_then(|raw| calibration.apply(&raw))
                });
                if tx.send((index, decoded)).is_err() {
                    break;
                }
            }
        });

        for (index, decoded) in rx {
            frame_names.push(source.frame_name(index));
            match decoded {
                Ok(frame) => {
                    let timestamp = frame.metadata.timestamp;
                    let step = tracker.step(&frame);
                    let fluxes = measure(&frame, &step.positions, &config.photometry);
                    for ((samples, flux), (position, refined)) in series
                        .iter_mut()
                        .zip(&fluxes)
                        .zip(step.positions.iter().zip(&step.refined_valid))
                    {
                        samples.push(if flux.valid && *refined {
                            PhotometrySample {
                                flux: flux.flux,
                                flux_error: flux.flux_error,
                                timestamp,
                                x: position.x,
                                y: position.y,
                                valid: true,
                            }
                        } else {
                            PhotometrySample::invalid(*position, timestamp)
                        });
                    }
                    timestamps.push(timestamp);
                }
                Err(e) if config.runtime.skip_malformed_frames && e.is_frame_local() => {
                    warn!(batch = %name, frame = index, error = %e, "Skipping unreadable frame");
                    tracker.skip();
                    for (samples, position) in series.iter_mut().zip(tracker.positions()) {
                        samples.push(PhotometrySample::invalid(*position, None));
                    }
                    timestamps.push(None);
                    skipped_frames += 1;
                }
                Err(e) => return Err(e),
            }
            reporter.advance(&name, index + 1);
        }
        Ok(())
    });
    tracked.map_err(BatchFailure::at(PipelineStage::Tracking))?;
    reporter.finish_stage(&name);

    for (star, position) in stars.iter_mut().zip(tracker.positions()) {
        star.position = *position;
    }
    if skipped_frames > 0 {
        warn!(batch = %name, skipped = skipped_frames, "Frames skipped during tracking");
    }

    reporter.begin_stage(&name, PipelineStage::Classifying, Some(stars.len()));
    let light_curves: Vec<LightCurve> = stars
        .into_iter()
        .zip(series)
        .map(|(star, samples)| {
            let flux: Vec<f64> = samples.iter().map(|s| s.flux).collect();
            LightCurve {
                star,
                stats: LightCurveStats::from_flux(&flux),
                verdict: classify(&flux, &config.quality),
                samples,
            }
        })
        .collect();
    reporter.finish_stage(&name);

    let result = BatchResult {
        directory: directory.to_path_buf(),
        name,
        gain: config.source.gain,
        frame_names,
        timestamps,
        drift: tracker.into_history(),
        light_curves,
        detection: search.origin,
        skipped_frames,
        reference,
        archive_dir: None,
    };
    info!(
        batch = %result.name,
        frames = result.frame_count(),
        stars = result.star_count(),
        good = result.good_count(),
        "Batch processed"
    );
    Ok(result)
}

/// Process a batch directory end to end: build calibration masters from its
/// subdirectories, run [`process_batch`], then write the light curves (and
/// optionally the reference stack) under `output`.
pub fn process_directory(
    directory: &Path,
    config: &PipelineConfig,
    output: &Path,
    reporter: &dyn ProgressReporter,
) -> StageResult<BatchResult> {
    let name = batch_name(directory);

    reporter.begin_stage(&name, PipelineStage::Calibrating, None);
    let source = FileFrameSource::from_directory(directory, &config.source)
        .map_err(BatchFailure::at(PipelineStage::Calibrating))?;
    let calibration =
        load_calibration(directory, config).map_err(BatchFailure::at(PipelineStage::Calibrating))?;
    reporter.finish_stage(&name);
    info!(batch = %name, frames = source.len(), "Calibration ready");

    let mut result = process_batch(&source, &calibration, config, directory, reporter)?;

    reporter.begin_stage(&name, PipelineStage::Archiving, Some(result.star_count()));
    let archive_dir =
        archive_batch(&result, config, output).map_err(BatchFailure::at(PipelineStage::Archiving))?;
    result.archive_dir = Some(archive_dir);
    reporter.finish_stage(&name);

    // The stack is only needed for archiving; drop it before returning.
    result.reference = None;
    Ok(result)
}

fn archive_batch(result: &BatchResult, config: &PipelineConfig, output: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output)?;
    if config.archive.save_reference {
        if let Some(reference) = &result.reference {
            let path = output.join(format!("{}_{}_stacked.fits", result.name, result.gain));
            write_fits_f32(reference, &path)?;
            info!(path = %path.display(), "Reference stack saved");
        }
    }
    write_batch(output, result, config)
}
