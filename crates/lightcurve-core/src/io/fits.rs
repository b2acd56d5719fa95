//! FITS frame ingestion and reference-stack export on top of `fitsio`.
//!
//! Frames are single 2-D primary images; the acquisition time comes from
//! `JD` or `DATE-OBS`. Pixel rows are kept in file order.

use std::path::{Path, PathBuf};

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::FitsHdu;
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use ndarray::Array2;

use crate::error::{LightcurveError, Result};
use crate::frame::{Frame, FrameMetadata, FrameTimestamp};
use crate::io::timestamp::{julian_date_to_timestamp, parse_iso_timestamp};

fn fits_error(path: &Path) -> impl Fn(fitsio::compat::errors::Error) -> LightcurveError + '_ {
    move |e| LightcurveError::Format(format!("{}: {e}", path.display()))
}

/// Primary image of one FITS file.
pub struct FitsReader {
    path: PathBuf,
    fptr: FitsFile,
    hdu: FitsHdu,
    file_len: u64,
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file_len = std::fs::metadata(path)?.len();
        let fptr = FitsFile::open(path).map_err(fits_error(path))?;
        let hdu = fptr.hdu(0).map_err(fits_error(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            fptr,
            hdu,
            file_len,
        })
    }

    /// Integer header value, `None` when absent or not an integer.
    pub fn key_i64(&self, key: &str) -> Option<i64> {
        self.hdu.read_key::<i64>(&self.fptr, key).ok()
    }

    pub fn key_f64(&self, key: &str) -> Option<f64> {
        self.hdu.read_key::<f64>(&self.fptr, key).ok()
    }

    pub fn key_string(&self, key: &str) -> Option<String> {
        self.hdu.read_key::<String>(&self.fptr, key).ok()
    }

    fn require_i64(&self, key: &str) -> Result<i64> {
        self.key_i64(key)
            .ok_or_else(|| LightcurveError::Format(format!("FITS header missing {key}")))
    }

    /// `(width, height)` of a single 2-D image whose data fits in the file.
    pub fn dimensions(&self) -> Result<(usize, usize)> {
        let naxis = self.require_i64("NAXIS")?;
        if naxis < 2 || (naxis > 2 && self.key_i64("NAXIS3").unwrap_or(1) != 1) {
            return Err(LightcurveError::Format(format!(
                "Expected a single 2-D FITS image, got NAXIS = {naxis}"
            )));
        }
        let width = usize::try_from(self.require_i64("NAXIS1")?).unwrap_or(0);
        let height = usize::try_from(self.require_i64("NAXIS2")?).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(LightcurveError::InvalidDimensions { width, height });
        }

        let bytes_per_sample = match self.require_i64("BITPIX")? {
            8 => 1,
            16 => 2,
            32 | -32 => 4,
            64 | -64 => 8,
            other => {
                return Err(LightcurveError::Format(format!("Unsupported BITPIX {other}")));
            }
        };
        let needed = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(bytes_per_sample))
            .and_then(|n| u64::try_from(n).ok());
        match needed {
            Some(n) if n <= self.file_len => Ok((width, height)),
            _ => Err(LightcurveError::Format(format!(
                "FITS data truncated: {}x{} image of {} byte samples in a {} byte file",
                width, height, bytes_per_sample, self.file_len
            ))),
        }
    }

    /// Acquisition time: `JD` if present, otherwise `DATE-OBS`.
    pub fn timestamp(&self) -> Result<Option<FrameTimestamp>> {
        if let Some(jd) = self.key_f64("JD") {
            return julian_date_to_timestamp(jd).map(Some);
        }
        match self.key_string("DATE-OBS") {
            Some(date) => parse_iso_timestamp(&date).map(Some),
            None => Ok(None),
        }
    }

    pub fn read_frame(&self) -> Result<Frame> {
        let (width, height) = self.dimensions()?;
        let bitpix = self.require_i64("BITPIX")?;

        let pixels = f64::read_image(&self.fptr, &self.hdu).map_err(fits_error(&self.path))?;
        let count = width * height;
        if pixels.len() < count {
            return Err(LightcurveError::Format(format!(
                "{}: expected {} pixels, read {}",
                self.path.display(),
                count,
                pixels.len()
            )));
        }
        let data = Array2::from_shape_vec(
            (height, width),
            pixels[..count].iter().map(|&v| v as f32).collect(),
        )
        .map_err(|e| LightcurveError::Format(e.to_string()))?;

        let mut frame = Frame::new(data, bitpix.unsigned_abs().min(64) as u8);
        frame.metadata = FrameMetadata {
            timestamp: self.timestamp()?,
            ..FrameMetadata::default()
        };
        Ok(frame)
    }
}

/// Write a frame as a 32-bit float primary image, with `DATE-OBS` when the
/// frame carries a timestamp.
pub fn write_fits_f32(frame: &Frame, path: &Path) -> Result<()> {
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: vec![frame.width(), frame.height()],
    };

    let mut fptr = FitsFile::create(path)
        .overwrite()
        .open()
        .map_err(fits_error(path))?;
    let hdu = fptr
        .create_image("PRIMARY", &description)
        .map_err(fits_error(path))?;

    let data: Vec<f32> = frame.data.iter().copied().collect();
    f32::write_image(&mut fptr, &hdu, &data).map_err(fits_error(path))?;

    if let Some(ts) = frame.metadata.timestamp {
        let iso = ts.time.format("%Y-%m-%dT%H:%M:%S%.9f").to_string();
        hdu.write_key(&mut fptr, "DATE-OBS", &iso)
            .map_err(fits_error(path))?;
    }
    Ok(())
}
