pub mod fits;
pub mod image_io;
pub mod rcd;
pub mod source;
pub mod timestamp;
