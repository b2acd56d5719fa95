use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_BACKGROUND_BLOCK, DEFAULT_DETECTION_EDGE_MARGIN, DEFAULT_MIN_AREA, DEFAULT_MIN_STARS,
    DEFAULT_THRESHOLD_SIGMA,
};

/// Configuration for star detection on a reference frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Detection threshold in units of the global background RMS.
    #[serde(default = "default_threshold_sigma")]
    pub threshold_sigma: f32,
    /// Minimum connected component area (pixels) to be a star candidate.
    #[serde(default = "default_min_area")]
    pub min_area: usize,
    /// Side of the square tiles used for the background mesh.
    #[serde(default = "default_background_block")]
    pub background_block: usize,
    /// Extra margin beyond the aperture radius a star must keep from the border.
    #[serde(default = "default_edge_margin")]
    pub edge_margin: f64,
    /// A detection attempt with fewer stars moves on to the next frame.
    #[serde(default = "default_min_stars")]
    pub min_stars: usize,
}

fn default_threshold_sigma() -> f32 {
    DEFAULT_THRESHOLD_SIGMA
}
fn default_min_area() -> usize {
    DEFAULT_MIN_AREA
}
fn default_background_block() -> usize {
    DEFAULT_BACKGROUND_BLOCK
}
fn default_edge_margin() -> f64 {
    DEFAULT_DETECTION_EDGE_MARGIN
}
fn default_min_stars() -> usize {
    DEFAULT_MIN_STARS
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: DEFAULT_THRESHOLD_SIGMA,
            min_area: DEFAULT_MIN_AREA,
            background_block: DEFAULT_BACKGROUND_BLOCK,
            edge_margin: DEFAULT_DETECTION_EDGE_MARGIN,
            min_stars: DEFAULT_MIN_STARS,
        }
    }
}
