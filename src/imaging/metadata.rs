//! EXIF reading: orientation for the decoder, descriptive fields for
//! [`ImageInfo`].
//!
//! Everything here is best-effort. A file without EXIF, or with a broken
//! EXIF block, reads as orientation 1 with no descriptive fields.

use super::calculations::display_dimensions;
use exif::{Exif, In, Tag, Value};
use serde::Serialize;
use std::io::Cursor;
use tracing::trace;

/// What `info` reports about one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    /// Display width (stored height when the orientation rotates).
    pub width: u32,
    pub height: u32,
    /// Byte length of the encoded file.
    pub file_size: u64,
    pub orientation: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_taken: Option<String>,
    /// `Make` and `Model`, space separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
}

fn read_exif(bytes: &[u8]) -> Option<Exif> {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
}

fn orientation_of(exif: &Exif) -> Option<u16> {
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match &field.value {
        Value::Short(v) if !v.is_empty() => Some(v[0]),
        Value::Long(v) if !v.is_empty() => Some(v[0] as u16),
        _ => None,
    }
}

fn ascii_of(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Ascii(parts) = &field.value else {
        return None;
    };
    let text = parts
        .iter()
        .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// EXIF orientation (1–8) of an encoded image; 1 when absent or unreadable.
pub fn read_orientation(bytes: &[u8]) -> u16 {
    let orientation = read_exif(bytes)
        .as_ref()
        .and_then(orientation_of)
        .filter(|o| (1..=8).contains(o))
        .unwrap_or(1);
    trace!(orientation, "exif orientation");
    orientation
}

/// Dimensions plus EXIF details of an encoded image.
///
/// Returns `None` if the header can't be parsed at all. Dimensions are
/// reported as displayed, so orientations 5–8 swap width and height.
pub fn read_image_info(bytes: &[u8]) -> Option<ImageInfo> {
    let stored = super::decode::intrinsic_dimensions(bytes).ok()?;
    let exif = read_exif(bytes);
    let orientation = exif
        .as_ref()
        .and_then(orientation_of)
        .filter(|o| (1..=8).contains(o))
        .unwrap_or(1);
    let (width, height) = display_dimensions(stored, orientation);

    let (date_taken, camera, software) = match &exif {
        Some(exif) => {
            let date = ascii_of(exif, Tag::DateTimeOriginal).or_else(|| ascii_of(exif, Tag::DateTime));
            let camera = match (ascii_of(exif, Tag::Make), ascii_of(exif, Tag::Model)) {
                (Some(make), Some(model)) => Some(format!("{make} {model}")),
                (make, model) => make.or(model),
            };
            (date, camera, ascii_of(exif, Tag::Software))
        }
        None => (None, None, None),
    };

    Some(ImageInfo {
        width,
        height,
        file_size: bytes.len() as u64,
        orientation,
        date_taken,
        camera,
        software,
    })
}
