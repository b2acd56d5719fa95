use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{
    PARALLEL_PIXEL_THRESHOLD, RCD_BIT_DEPTH, RCD_HEIGHT, RCD_PAYLOAD_OFFSET, RCD_SERIAL_LEN,
    RCD_SERIAL_OFFSET, RCD_TIMESTAMP_LEN, RCD_TIMESTAMP_OFFSET, RCD_WIDTH,
};
use crate::error::{LightcurveError, Result};
use crate::frame::{Frame, FrameMetadata, FrameTimestamp, GainChannel};
use crate::io::timestamp::{parse_header_timestamp, DirectoryClock};

/// Pixel geometry of one gain channel of an `.rcd` frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RcdGeometry {
    pub width: usize,
    pub height: usize,
}

impl Default for RcdGeometry {
    fn default() -> Self {
        Self {
            width: RCD_WIDTH,
            height: RCD_HEIGHT,
        }
    }
}

impl RcdGeometry {
    /// Number of 12-bit samples in the payload (both gain channels).
    pub fn sample_count(&self) -> usize {
        self.width * self.height * 2
    }

    /// Payload size in bytes: 3 bytes per 2 samples.
    pub fn payload_bytes(&self) -> usize {
        self.sample_count() / 2 * 3
    }
}

/// Fixed-offset `.rcd` header fields.
#[derive(Clone, Debug)]
pub struct RcdHeader {
    pub serial_number: String,
    /// Timestamp text exactly as stored (NUL padding trimmed).
    pub timestamp_raw: String,
}

/// Unpack 12-bit samples: every 3 bytes hold 2 samples.
///
/// `out[2i] = (b0 << 4) | (b1 >> 4)`, `out[2i+1] = ((b1 & 0xF) << 8) | b2`.
pub fn unpack_12bit(payload: &[u8]) -> Result<Vec<u16>> {
    if payload.len() % 3 != 0 {
        return Err(LightcurveError::Format(format!(
            "Packed payload length {} is not a multiple of 3",
            payload.len()
        )));
    }

    let mut out = vec![0u16; payload.len() / 3 * 2];
    let unpack = |(src, dst): (&[u8], &mut [u16])| {
        let (b0, b1, b2) = (src[0] as u16, src[1] as u16, src[2] as u16);
        dst[0] = (b0 << 4) | (b1 >> 4);
        dst[1] = ((b1 & 0x0F) << 8) | b2;
    };

    if out.len() >= PARALLEL_PIXEL_THRESHOLD {
        payload
            .par_chunks_exact(3)
            .zip(out.par_chunks_exact_mut(2))
            .for_each(unpack);
    } else {
        payload
            .chunks_exact(3)
            .zip(out.chunks_exact_mut(2))
            .for_each(unpack);
    }
    Ok(out)
}

/// Select one gain channel out of the row-interleaved sample stream.
///
/// Samples form `2 * height` rows of `width`; even rows are low gain, odd
/// rows high gain.
pub fn split_gain_channel(
    samples: &[u16],
    geometry: RcdGeometry,
    gain: GainChannel,
) -> Result<Array2<f32>> {
    let RcdGeometry { width, height } = geometry;
    if samples.len() != geometry.sample_count() {
        return Err(LightcurveError::Format(format!(
            "Expected {} samples for {}x{} two-gain frame, got {}",
            geometry.sample_count(),
            width,
            height,
            samples.len()
        )));
    }

    let offset = gain.row_offset();
    Ok(Array2::from_shape_fn((height, width), |(row, col)| {
        samples[(2 * row + offset) * width + col] as f32
    }))
}

/// Memory-mapped `.rcd` frame reader.
pub struct RcdReader {
    mmap: Mmap,
    pub header: RcdHeader,
    pub geometry: RcdGeometry,
}

impl RcdReader {
    /// Open an `.rcd` file and parse its header.
    pub fn open(path: &Path, geometry: RcdGeometry) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let expected = RCD_PAYLOAD_OFFSET + geometry.payload_bytes();
        if mmap.len() < expected {
            return Err(LightcurveError::Format(format!(
                "{}: file truncated, expected at least {} bytes, got {}",
                path.display(),
                expected,
                mmap.len()
            )));
        }

        let header = parse_header(&mmap[..RCD_PAYLOAD_OFFSET]);
        Ok(Self {
            mmap,
            header,
            geometry,
        })
    }

    /// Raw packed payload (zero-copy from mmap).
    pub fn payload(&self) -> &[u8] {
        &self.mmap[RCD_PAYLOAD_OFFSET..RCD_PAYLOAD_OFFSET + self.geometry.payload_bytes()]
    }

    pub fn timestamp(
        &self,
        hint: Option<&DirectoryClock>,
        utc_offset_hours: i64,
    ) -> Result<FrameTimestamp> {
        parse_header_timestamp(&self.header.timestamp_raw, hint, utc_offset_hours)
    }

    /// Decode the requested gain channel into a frame.
    pub fn read_frame(
        &self,
        gain: GainChannel,
        hint: Option<&DirectoryClock>,
        utc_offset_hours: i64,
    ) -> Result<Frame> {
        let samples = unpack_12bit(self.payload())?;
        let data = split_gain_channel(&samples, self.geometry, gain)?;

        let mut frame = Frame::new(data, RCD_BIT_DEPTH);
        frame.metadata = FrameMetadata {
            timestamp: Some(self.timestamp(hint, utc_offset_hours)?),
            gain: Some(gain),
            ..FrameMetadata::default()
        };
        Ok(frame)
    }
}

fn parse_header(buf: &[u8]) -> RcdHeader {
    RcdHeader {
        serial_number: read_fixed_string(
            &buf[RCD_SERIAL_OFFSET..RCD_SERIAL_OFFSET + RCD_SERIAL_LEN],
        ),
        timestamp_raw: read_fixed_string(
            &buf[RCD_TIMESTAMP_OFFSET..RCD_TIMESTAMP_OFFSET + RCD_TIMESTAMP_LEN],
        ),
    }
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
