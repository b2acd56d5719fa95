use std::path::PathBuf;

use crate::detection::DetectionOrigin;
use crate::error::LightcurveError;
use crate::frame::{DriftVector, Frame, FrameTimestamp, GainChannel, Position};
use crate::quality::{LightCurveStats, QualityVerdict};

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Calibrating,
    Stacking,
    Detecting,
    Tracking,
    Classifying,
    Archiving,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calibrating => write!(f, "Building calibration"),
            Self::Stacking => write!(f, "Stacking reference"),
            Self::Detecting => write!(f, "Detecting stars"),
            Self::Tracking => write!(f, "Tracking frames"),
            Self::Classifying => write!(f, "Classifying"),
            Self::Archiving => write!(f, "Writing light curves"),
        }
    }
}

/// Thread-safe progress reporting for batch processing.
///
/// Batches may run concurrently, so every call names the batch it belongs
/// to. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _batch: &str, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _batch: &str, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self, _batch: &str) {}
}

/// Progress reporter that ignores everything.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// One tracked star. Created at detection and never removed.
#[derive(Clone, Debug, PartialEq)]
pub struct StarRecord {
    pub index: usize,
    /// Position where the star was detected.
    pub initial: Position,
    pub radius: f64,
    /// Position on the most recent frame.
    pub position: Position,
}

/// Flux of one star on one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhotometrySample {
    pub flux: f64,
    pub flux_error: f64,
    pub timestamp: Option<FrameTimestamp>,
    pub x: f64,
    pub y: f64,
    /// `false` for edge-clipped stars, failed refinements and skipped frames.
    /// Flux and error are zero in that case.
    pub valid: bool,
}

impl PhotometrySample {
    pub fn invalid(position: Position, timestamp: Option<FrameTimestamp>) -> Self {
        Self {
            flux: 0.0,
            flux_error: 0.0,
            timestamp,
            x: position.x,
            y: position.y,
            valid: false,
        }
    }
}

/// A star's full time series with its verdict.
#[derive(Clone, Debug)]
pub struct LightCurve {
    pub star: StarRecord,
    /// One sample per frame of the batch, in frame order.
    pub samples: Vec<PhotometrySample>,
    pub stats: LightCurveStats,
    pub verdict: QualityVerdict,
}

impl LightCurve {
    pub fn flux(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.flux).collect()
    }
}

/// Everything a batch produced.
#[derive(Clone, Debug)]
pub struct BatchResult {
    pub directory: PathBuf,
    /// Directory name, used in archive file names.
    pub name: String,
    pub gain: GainChannel,
    pub frame_names: Vec<String>,
    pub timestamps: Vec<Option<FrameTimestamp>>,
    /// Drift applied on each frame; zero for skipped frames.
    pub drift: Vec<DriftVector>,
    pub light_curves: Vec<LightCurve>,
    pub detection: DetectionOrigin,
    pub skipped_frames: usize,
    /// Reference stack, when one was built.
    pub reference: Option<Frame>,
    /// Where the light curves were written, once archived.
    pub archive_dir: Option<PathBuf>,
}

impl BatchResult {
    pub fn star_count(&self) -> usize {
        self.light_curves.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_names.len()
    }

    pub fn good_count(&self) -> usize {
        self.light_curves
            .iter()
            .filter(|lc| lc.verdict.is_good())
            .count()
    }

    pub fn count_verdict(&self, verdict: QualityVerdict) -> usize {
        self.light_curves
            .iter()
            .filter(|lc| lc.verdict == verdict)
            .count()
    }
}

/// A batch-fatal error together with the stage that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {error}")]
pub struct BatchFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: LightcurveError,
}

impl BatchFailure {
    /// Error adapter for `map_err`.
    pub fn at(stage: PipelineStage) -> impl Fn(LightcurveError) -> Self {
        move |error| Self { stage, error }
    }
}

/// Outcome of one batch in a multi-batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub directory: PathBuf,
    pub outcome: std::result::Result<BatchResult, BatchFailure>,
}
