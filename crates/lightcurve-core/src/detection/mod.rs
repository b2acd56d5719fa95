pub mod background;
pub mod components;
pub mod config;
pub mod stars;

pub use config::DetectionConfig;
pub use stars::{
    detect_stars, filter_edge_stars, locate_stars, DetectedStar, DetectionOrigin, StarSearch,
};
