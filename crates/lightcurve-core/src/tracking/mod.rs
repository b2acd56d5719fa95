pub mod centroid;
pub mod tracker;

pub use centroid::windowed_centroid;
pub use tracker::{tracking_sigma, DriftTracker, TrackStep};
