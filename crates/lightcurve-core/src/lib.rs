pub mod archive;
pub mod calibration;
pub mod consts;
pub mod detection;
pub mod error;
pub mod frame;
pub mod io;
pub mod photometry;
pub mod pipeline;
pub mod quality;
pub mod stack;
pub mod tracking;
