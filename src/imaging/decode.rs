//! Decode pipeline: encoded bytes → oriented, size-adapted bitmap.
//!
//! ```text
//! bytes ──► header (intrinsic size) ──► EXIF orientation
//!       ──► decode_dimensions()     ──► full decode + Lanczos3 downscale
//!       ──► orientation transform   ──► DynamicImage
//! ```
//!
//! [`decode`] never fails outward: any error is logged at `debug` and comes
//! back as `None`, leaving placeholder choice to the caller.
//!
//! Throttling is not done here. The loader holds a
//! [`DecodePermit`](crate::throttle::DecodePermit) around every call.

use super::calculations::decode_dimensions;
use super::metadata::read_orientation;
use crate::types::DecodeSize;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

/// Stored pixel dimensions, read from the header only.
pub fn intrinsic_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    Ok(reader(bytes)?.into_dimensions()?)
}

/// Apply an EXIF orientation (1–8) to decoded pixels. Other values are a no-op.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate90().flipv(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn try_decode(bytes: &[u8], target: DecodeSize) -> Result<DynamicImage, DecodeError> {
    let stored = intrinsic_dimensions(bytes)?;
    let orientation = read_orientation(bytes);
    let (w, h) = decode_dimensions(stored, target, orientation);

    let mut img = reader(bytes)?.decode()?;
    if (w, h) != (img.width(), img.height()) {
        img = img.resize_exact(w, h, FilterType::Lanczos3);
    }
    Ok(apply_orientation(img, orientation))
}

/// Decode `bytes` at `target` (see [`decode_dimensions`] for sizing rules),
/// upright per EXIF orientation. `None` on any failure.
pub fn decode(bytes: &[u8], target: DecodeSize) -> Option<DynamicImage> {
    match try_decode(bytes, target) {
        Ok(img) => Some(img),
        Err(e) => {
            debug!(error = %e, "decode failed");
            None
        }
    }
}

/// Lossless encoding used for cache rows.
pub fn encode_png(img: &DynamicImage) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    match img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png) {
        Ok(()) => Some(buf),
        Err(e) => {
            debug!(error = %e, "png encode failed");
            None
        }
    }
}

/// Read back a cache row written by [`encode_png`].
pub fn decode_png(bytes: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png).ok()
}
