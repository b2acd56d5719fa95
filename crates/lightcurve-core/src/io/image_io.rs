use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};

use crate::error::Result;
use crate::frame::Frame;
use crate::io::fits::write_fits_f32;

/// Linear stretch bounds: (min, max) of the finite pixel values.
fn stretch_bounds(frame: &Frame) -> (f32, f32) {
    let (lo, hi) = frame
        .data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo.is_finite() && hi > lo {
        (lo, hi)
    } else {
        (0.0, 1.0)
    }
}

fn stretched(frame: &Frame, scale: f32) -> impl Iterator<Item = f32> + '_ {
    let (lo, hi) = stretch_bounds(frame);
    let span = hi - lo;
    frame
        .data
        .iter()
        .map(move |&v| ((v - lo) / span).clamp(0.0, 1.0) * scale)
}

/// Save a frame as 16-bit grayscale TIFF, linearly stretched to full range.
pub fn save_tiff(frame: &Frame, path: &Path) -> Result<()> {
    let h = frame.height();
    let w = frame.width();

    let pixels: Vec<u16> = stretched(frame, 65535.0).map(|v| v as u16).collect();

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| crate::error::LightcurveError::InvalidDimensions {
            width: w,
            height: h,
        })?;
    img.save(path)?;
    Ok(())
}

/// Save a frame as 8-bit grayscale PNG, linearly stretched to full range.
pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let h = frame.height();
    let w = frame.width();

    let mut img = GrayImage::new(w as u32, h as u32);
    for (i, val) in stretched(frame, 255.0).enumerate() {
        img.put_pixel((i % w) as u32, (i / w) as u32, Luma([val as u8]));
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save frame, choosing format from file extension.
///
/// `.fits`/`.fit` keep the ADU values; TIFF and PNG are display previews.
pub fn save_image(frame: &Frame, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("fits" | "fit") => write_fits_f32(frame, path),
        Some("png") => save_png(frame, path),
        _ => save_tiff(frame, path),
    }
}
