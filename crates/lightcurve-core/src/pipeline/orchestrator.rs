use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::io::source::{discover_frames, FrameFormat};

use super::batch::process_directory;
use super::config::PipelineConfig;
use super::types::{BatchReport, ProgressReporter};

/// Subdirectories holding calibration frames rather than science batches.
const CALIBRATION_DIRS: [&str; 3] = ["Bias", "Dark", "Flat"];

/// Expand `root` into batch directories.
///
/// A directory that itself holds frames of `format` is a single batch.
/// Otherwise every non-calibration subdirectory holding frames is a batch,
/// in name order.
pub fn discover_batches(root: &Path, format: FrameFormat) -> Result<Vec<PathBuf>> {
    if !discover_frames(root, format)?.is_empty() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut batches = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let is_calibration = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| CALIBRATION_DIRS.contains(&n));
        if is_calibration {
            continue;
        }
        if !discover_frames(&path, format)?.is_empty() {
            batches.push(path);
        }
    }
    batches.sort();
    Ok(batches)
}

/// Process independent batches in parallel.
///
/// A failing batch is reported in its [`BatchReport`] and never stops the
/// others. Reports come back in the order of `directories`.
pub fn run_batches(
    directories: &[PathBuf],
    config: &PipelineConfig,
    output: &Path,
    reporter: &dyn ProgressReporter,
) -> Vec<BatchReport> {
    info!(batches = directories.len(), output = %output.display(), "Processing batches");

    let reports: Vec<BatchReport> = directories
        .par_iter()
        .map(|directory| {
            let outcome = process_directory(directory, config, output, reporter);
            if let Err(failure) = &outcome {
                warn!(batch = %directory.display(), error = %failure, "Batch failed");
            }
            BatchReport {
                directory: directory.clone(),
                outcome,
            }
        })
        .collect();

    let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
    info!(
        succeeded = reports.len() - failed,
        failed, "All batches finished"
    );
    reports
}
