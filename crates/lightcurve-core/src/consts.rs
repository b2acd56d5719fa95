/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum star count to measure apertures in parallel.
pub const PARALLEL_STAR_THRESHOLD: usize = 64;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Sensor width of the two-gain camera, in pixels.
pub const RCD_WIDTH: usize = 2048;

/// Sensor height of one gain channel, in pixels.
pub const RCD_HEIGHT: usize = 2048;

/// Byte offset of the camera serial number in an `.rcd` header.
pub const RCD_SERIAL_OFFSET: usize = 63;

/// Length of the camera serial number field.
pub const RCD_SERIAL_LEN: usize = 9;

/// Byte offset of the acquisition timestamp in an `.rcd` header.
pub const RCD_TIMESTAMP_OFFSET: usize = 152;

/// Length of the acquisition timestamp field.
pub const RCD_TIMESTAMP_LEN: usize = 29;

/// Byte offset of the packed pixel payload in an `.rcd` file.
pub const RCD_PAYLOAD_OFFSET: usize = 384;

/// Native bit depth of `.rcd` samples.
pub const RCD_BIT_DEPTH: u8 = 12;

/// Julian date of the Unix epoch.
pub const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Minimum number of frames needed to build any master calibration frame.
pub const MIN_CALIBRATION_FRAMES: usize = 2;

/// Default number of calibration frames combined into a master.
pub const DEFAULT_CALIBRATION_FRAMES: usize = 10;

/// First frame included in the detection stack (frame 0 suffers vignetting).
pub const DEFAULT_STACK_START: usize = 2;

/// Default number of frames combined into the detection stack.
pub const DEFAULT_STACK_COUNT: usize = 10;

/// Fewest decodable frames a reference stack is built from.
pub const MIN_STACKED_FRAMES: usize = 2;

/// Default detection threshold in units of background RMS.
pub const DEFAULT_THRESHOLD_SIGMA: f32 = 3.0;

/// Default minimum connected area (pixels) of a detected source.
pub const DEFAULT_MIN_AREA: usize = 5;

/// Default background mesh block size in pixels.
pub const DEFAULT_BACKGROUND_BLOCK: usize = 64;

/// Sigma-clipping factor for the global background RMS.
pub const BACKGROUND_CLIP_SIGMA: f32 = 3.0;

/// Sigma-clipping iterations for the global background RMS.
pub const BACKGROUND_CLIP_ITERATIONS: usize = 3;

/// Extra margin (px) beyond the aperture a detected star must keep from the border.
pub const DEFAULT_DETECTION_EDGE_MARGIN: f64 = 3.0;

/// Minimum number of stars a detection attempt must yield.
pub const DEFAULT_MIN_STARS: usize = 10;

/// FWHM to Gaussian sigma conversion used for the centroid window weight.
pub const FWHM_TO_SIGMA: f64 = 2.35;

/// Smallest Gaussian sigma the windowed centroid will accept.
pub const MIN_CENTROID_SIGMA: f64 = 0.5;

/// Window radius as a multiple of the Gaussian sigma.
pub const DEFAULT_WINDOW_SCALE: f64 = 4.0;

/// Maximum windowed-centroid iterations.
pub const DEFAULT_CENTROID_ITERATIONS: usize = 16;

/// Squared step (px²) below which the windowed centroid has converged.
pub const CENTROID_CONVERGENCE: f64 = 2e-4;

/// Sub-pixel sampling per axis for boundary pixels.
pub const DEFAULT_SUBPIX: usize = 5;

/// Default aperture radius in pixels.
pub const DEFAULT_APERTURE_RADIUS: f64 = 4.0;

/// Default inner annulus offset from the aperture radius.
pub const DEFAULT_ANNULUS_INNER: f64 = 2.0;

/// Default outer annulus offset from the aperture radius.
pub const DEFAULT_ANNULUS_OUTER: f64 = 4.0;

/// Stars closer than this to any border get zero flux.
pub const DEFAULT_PHOTOMETRY_EDGE_MARGIN: f64 = 20.0;

/// Ideal number of frames in one batch directory (one minute of data).
pub const DEFAULT_FRAMES_PER_MINUTE: usize = 2400;

/// Minimum median/stddev ratio of a usable light curve.
pub const DEFAULT_MIN_SNR: f64 = 5.0;

/// Local-to-UTC hour offset applied by the timestamp hour heuristic.
pub const DEFAULT_UTC_OFFSET_HOURS: i64 = 4;

/// Number of decoded frames buffered ahead of tracking.
pub const DEFAULT_PREFETCH_DEPTH: usize = 4;

/// Worker threads in each batch's frame-decoding pool.
pub const DEFAULT_DECODE_THREADS: usize = 2;
