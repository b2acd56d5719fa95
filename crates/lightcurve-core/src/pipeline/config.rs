use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::detection::config::DetectionConfig;
use crate::error::{LightcurveError, Result};
use crate::frame::GainChannel;
use crate::io::rcd::RcdGeometry;
use crate::io::source::FrameFormat;

/// Every tunable of a batch run. All sections default, so an empty TOML file
/// is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub stacking: StackingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub photometry: PhotometryConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| LightcurveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LightcurveError::Config(e.to_string()))
    }

    /// Reject values no batch could run with.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(LightcurveError::Config(msg.to_string()));
        if self.source.width == 0 || self.source.height == 0 {
            return Err(LightcurveError::InvalidDimensions {
                width: self.source.width,
                height: self.source.height,
            });
        }
        if !(self.photometry.aperture_radius > 0.0) {
            return bad("photometry.aperture_radius must be positive");
        }
        if self.photometry.annulus_outer <= self.photometry.annulus_inner {
            return bad("photometry.annulus_outer must exceed annulus_inner");
        }
        if !(self.detection.threshold_sigma > 0.0) {
            return bad("detection.threshold_sigma must be positive");
        }
        if self.calibration.frame_count < MIN_CALIBRATION_FRAMES {
            return bad("calibration.frame_count must be at least 2");
        }
        if self.runtime.prefetch_depth == 0 {
            return bad("runtime.prefetch_depth must be at least 1");
        }
        if self.runtime.decode_threads == 0 {
            return bad("runtime.decode_threads must be at least 1");
        }
        Ok(())
    }
}

/// Which files a batch is read from and how they are decoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub format: FrameFormat,
    #[serde(default)]
    pub gain: GainChannel,
    /// Per-channel sensor width of packed frames.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Per-channel sensor height of packed frames.
    #[serde(default = "default_height")]
    pub height: usize,
    /// Added to the directory-name hour when repairing an out-of-range
    /// header hour.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i64,
}

impl SourceConfig {
    pub fn geometry(&self) -> RcdGeometry {
        RcdGeometry {
            width: self.width,
            height: self.height,
        }
    }
}

fn default_width() -> usize {
    RCD_WIDTH
}
fn default_height() -> usize {
    RCD_HEIGHT
}
fn default_utc_offset() -> i64 {
    DEFAULT_UTC_OFFSET_HOURS
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            format: FrameFormat::default(),
            gain: GainChannel::default(),
            width: RCD_WIDTH,
            height: RCD_HEIGHT,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Frames read from each of `Bias/`, `Dark/` and `Flat/`.
    #[serde(default = "default_calibration_frames")]
    pub frame_count: usize,
    #[serde(default)]
    pub use_dark_flat: bool,
}

fn default_calibration_frames() -> usize {
    DEFAULT_CALIBRATION_FRAMES
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_CALIBRATION_FRAMES,
            use_dark_flat: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackMethod {
    #[default]
    Mean,
    Median,
}

impl std::fmt::Display for StackMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mean => write!(f, "Mean"),
            Self::Median => write!(f, "Median"),
        }
    }
}

/// Reference-stack window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackingConfig {
    /// Index of the first frame combined.
    #[serde(default = "default_stack_start")]
    pub start: usize,
    /// Number of frames combined; 0 disables stacking.
    #[serde(default = "default_stack_count")]
    pub count: usize,
    #[serde(default)]
    pub method: StackMethod,
    /// Batches shorter than this are not stacked even if the window fits.
    #[serde(default)]
    pub min_source_frames: usize,
}

fn default_stack_start() -> usize {
    DEFAULT_STACK_START
}
fn default_stack_count() -> usize {
    DEFAULT_STACK_COUNT
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_STACK_START,
            count: DEFAULT_STACK_COUNT,
            method: StackMethod::default(),
            min_source_frames: 0,
        }
    }
}

/// Windowed centroid parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Sub-samples per axis for pixels on the window boundary.
    #[serde(default = "default_subpix")]
    pub subpix: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Window radius in units of the weighting sigma.
    #[serde(default = "default_window_scale")]
    pub window_scale: f64,
}

fn default_subpix() -> usize {
    DEFAULT_SUBPIX
}
fn default_max_iterations() -> usize {
    DEFAULT_CENTROID_ITERATIONS
}
fn default_window_scale() -> f64 {
    DEFAULT_WINDOW_SCALE
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            subpix: DEFAULT_SUBPIX,
            max_iterations: DEFAULT_CENTROID_ITERATIONS,
            window_scale: DEFAULT_WINDOW_SCALE,
        }
    }
}

/// Aperture geometry and noise model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhotometryConfig {
    #[serde(default = "default_aperture_radius")]
    pub aperture_radius: f64,
    /// Annulus inner edge, measured outward from the aperture radius.
    #[serde(default = "default_annulus_inner")]
    pub annulus_inner: f64,
    /// Annulus outer edge, measured outward from the aperture radius.
    #[serde(default = "default_annulus_outer")]
    pub annulus_outer: f64,
    /// Stars closer than this to any edge are not measured.
    #[serde(default = "default_photometry_edge_margin")]
    pub edge_margin: f64,
    #[serde(default = "default_subpix")]
    pub subpix: usize,
    /// Electrons per ADU; adds the Poisson term to the flux error when set.
    #[serde(default)]
    pub gain: Option<f64>,
}

fn default_aperture_radius() -> f64 {
    DEFAULT_APERTURE_RADIUS
}
fn default_annulus_inner() -> f64 {
    DEFAULT_ANNULUS_INNER
}
fn default_annulus_outer() -> f64 {
    DEFAULT_ANNULUS_OUTER
}
fn default_photometry_edge_margin() -> f64 {
    DEFAULT_PHOTOMETRY_EDGE_MARGIN
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            aperture_radius: DEFAULT_APERTURE_RADIUS,
            annulus_inner: DEFAULT_ANNULUS_INNER,
            annulus_outer: DEFAULT_ANNULUS_OUTER,
            edge_margin: DEFAULT_PHOTOMETRY_EDGE_MARGIN,
            subpix: DEFAULT_SUBPIX,
            gain: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Length of the head and tail windows compared for tracking failure.
    #[serde(default = "default_frames_per_minute")]
    pub frames_per_minute: usize,
    #[serde(default = "default_min_snr")]
    pub min_snr: f64,
}

fn default_frames_per_minute() -> usize {
    DEFAULT_FRAMES_PER_MINUTE
}
fn default_min_snr() -> f64 {
    DEFAULT_MIN_SNR
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            frames_per_minute: DEFAULT_FRAMES_PER_MINUTE,
            min_snr: DEFAULT_MIN_SNR,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_telescope")]
    pub telescope: String,
    /// Also write the reference stack as `<batch>_<gain>_stacked.fits`.
    #[serde(default)]
    pub save_reference: bool,
}

fn default_telescope() -> String {
    "telescope".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            telescope: default_telescope(),
            save_reference: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Decoded frames buffered ahead of the tracker.
    #[serde(default = "default_prefetch_depth")]
    pub prefetch_depth: usize,
    /// Record undecodable frames as invalid samples instead of failing the
    /// batch.
    #[serde(default = "default_skip_malformed")]
    pub skip_malformed_frames: bool,
    /// Threads of the batch-private pool that decodes frames ahead of
    /// tracking. Decoding never runs on the global pool.
    #[serde(default = "default_decode_threads")]
    pub decode_threads: usize,
}

fn default_prefetch_depth() -> usize {
    DEFAULT_PREFETCH_DEPTH
}
fn default_skip_malformed() -> bool {
    true
}
fn default_decode_threads() -> usize {
    DEFAULT_DECODE_THREADS
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prefetch_depth: DEFAULT_PREFETCH_DEPTH,
            skip_malformed_frames: true,
            decode_threads: DEFAULT_DECODE_THREADS,
        }
    }
}
