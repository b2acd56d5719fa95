use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::Array2;

use lightcurve_core::consts::{
    RCD_PAYLOAD_OFFSET, RCD_SERIAL_OFFSET, RCD_TIMESTAMP_LEN, RCD_TIMESTAMP_OFFSET,
};
use lightcurve_core::error::{LightcurveError, Result};
use lightcurve_core::frame::{Frame, FrameMetadata, FrameTimestamp};
use lightcurve_core::io::source::FrameSource;

/// Deterministic linear congruential generator for reproducible noise.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    /// Uniform in (0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    /// Standard normal sample (Box-Muller).
    pub fn gaussian(&mut self) -> f64 {
        let u1 = self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// A synthetic Gaussian star: position, total flux and PSF sigma.
#[derive(Clone, Copy, Debug)]
pub struct SynthStar {
    pub x: f64,
    pub y: f64,
    pub flux: f64,
    pub sigma: f64,
}

impl SynthStar {
    pub fn new(x: f64, y: f64, flux: f64) -> Self {
        Self {
            x,
            y,
            flux,
            sigma: 1.5,
        }
    }

    pub fn shifted(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Render stars on a constant background with optional Gaussian noise.
pub fn star_field(
    height: usize,
    width: usize,
    background: f64,
    noise_sigma: f64,
    stars: &[SynthStar],
    seed: u64,
) -> Array2<f32> {
    let mut rng = Lcg::new(seed);
    Array2::from_shape_fn((height, width), |(row, col)| {
        let mut v = background;
        for s in stars {
            let dx = col as f64 - s.x;
            let dy = row as f64 - s.y;
            let amp = s.flux / (2.0 * std::f64::consts::PI * s.sigma * s.sigma);
            v += amp * (-(dx * dx + dy * dy) / (2.0 * s.sigma * s.sigma)).exp();
        }
        if noise_sigma > 0.0 {
            v += noise_sigma * rng.gaussian();
        }
        v as f32
    })
}

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 6, 18)
        .and_then(|d| d.and_hms_opt(16, 34, 56))
        .expect("valid date")
}

/// Frame `index` of a 40 fps sequence starting at [`base_time`].
pub fn timestamp_for(index: usize) -> FrameTimestamp {
    FrameTimestamp::exact(base_time() + Duration::milliseconds(25 * index as i64))
}

pub fn frame_with_time(data: Array2<f32>, index: usize) -> Frame {
    let mut frame = Frame::new(data, 12);
    frame.metadata = FrameMetadata {
        frame_index: index,
        timestamp: Some(timestamp_for(index)),
        ..FrameMetadata::default()
    };
    frame
}

/// In-memory frame source. `None` entries decode as malformed frames.
pub struct MemorySource {
    pub frames: Vec<Option<Frame>>,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter().map(Some).collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        match self.frames.get(index) {
            Some(Some(frame)) => {
                let mut frame = frame.clone();
                frame.metadata.frame_index = index;
                frame.metadata.source_name = Some(self.frame_name(index));
                Ok(frame)
            }
            Some(None) => Err(LightcurveError::Format(format!(
                "frame {index} is corrupt"
            ))),
            None => Err(LightcurveError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            }),
        }
    }

    fn frame_name(&self, index: usize) -> String {
        format!("field1_{index:06}.rcd")
    }
}

/// A sequence of noisy frames of the same stars, each shifted by
/// `drift_per_frame * index`.
pub fn star_sequence(
    count: usize,
    size: (usize, usize),
    stars: &[SynthStar],
    noise_sigma: f64,
    drift_per_frame: (f64, f64),
) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let shifted: Vec<SynthStar> = stars
                .iter()
                .map(|s| {
                    s.shifted(
                        drift_per_frame.0 * i as f64,
                        drift_per_frame.1 * i as f64,
                    )
                })
                .collect();
            let data = star_field(size.0, size.1, 100.0, noise_sigma, &shifted, 1000 + i as u64);
            frame_with_time(data, i)
        })
        .collect()
}

/// Pack 12-bit samples two per three bytes.
pub fn pack_12bit(samples: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() / 2 * 3);
    for pair in samples.chunks_exact(2) {
        let (a, b) = (pair[0] & 0x0FFF, pair[1] & 0x0FFF);
        out.push((a >> 4) as u8);
        out.push((((a & 0x0F) << 4) | (b >> 8)) as u8);
        out.push((b & 0xFF) as u8);
    }
    out
}

/// Build a complete `.rcd` file: header with serial and timestamp, then the
/// row-interleaved (low, high) payload.
pub fn build_rcd(low: &Array2<u16>, high: &Array2<u16>, timestamp: &str) -> Vec<u8> {
    let (h, w) = high.dim();
    let mut buf = vec![0u8; RCD_PAYLOAD_OFFSET];
    buf[RCD_SERIAL_OFFSET..RCD_SERIAL_OFFSET + 9].copy_from_slice(b"CAM000042");
    let ts = timestamp.as_bytes();
    let n = ts.len().min(RCD_TIMESTAMP_LEN);
    buf[RCD_TIMESTAMP_OFFSET..RCD_TIMESTAMP_OFFSET + n].copy_from_slice(&ts[..n]);

    let mut samples = Vec::with_capacity(h * w * 2);
    for row in 0..h {
        samples.extend(low.row(row).iter().copied());
        samples.extend(high.row(row).iter().copied());
    }
    buf.extend(pack_12bit(&samples));
    buf
}

/// Quantize a float image to clamped 12-bit samples.
pub fn to_u12(data: &Array2<f32>) -> Array2<u16> {
    data.mapv(|v| v.round().clamp(0.0, 4095.0) as u16)
}

pub fn rcd_timestamp(index: usize) -> String {
    timestamp_for(index)
        .time
        .format("%Y-%m-%dT%H:%M:%S%.9f")
        .to_string()
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).expect("create dir");
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write file");
    path
}
