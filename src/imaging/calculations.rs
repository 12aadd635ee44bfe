//! Pure calculation functions for decode sizing and orientation.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::types::DecodeSize;

/// Whether an EXIF orientation stores pixels rotated by 90° or 270°
/// relative to how they are displayed (values 5–8).
pub fn swaps_axes(orientation: u16) -> bool {
    matches!(orientation, 5..=8)
}

/// Display dimensions of an image whose stored pixels are `stored`.
pub fn display_dimensions(stored: (u32, u32), orientation: u16) -> (u32, u32) {
    if swaps_axes(orientation) {
        (stored.1, stored.0)
    } else {
        stored
    }
}

/// Clamp a requested on-screen size to the intrinsic size, then rotate the
/// request into stored-pixel space.
///
/// Each axis is clamped against the stored dimensions *before* the swap, so
/// a request never asks for more pixels than the file holds on that axis.
/// A default (`0x0`) request passes through unchanged.
///
/// ```text
/// stored 400x200, orientation 6, request 100x200
///   clamp → 100x200   swap → 200x100 (stored-pixel space)
/// ```
pub fn effective_target(stored: (u32, u32), requested: DecodeSize, orientation: u16) -> DecodeSize {
    if requested.is_default() {
        return requested;
    }
    let width = requested.width.min(stored.0);
    let height = requested.height.min(stored.1);
    if swaps_axes(orientation) {
        DecodeSize::new(height, width)
    } else {
        DecodeSize::new(width, height)
    }
}

/// Which axis the decoder is told to hit; the other follows the source ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Decode at intrinsic size.
    None,
    Width(u32),
    Height(u32),
}

/// Pick the single axis to constrain for `target` (in stored-pixel space).
///
/// Setting both axes would distort the image, so when both are given the
/// axis with the tighter fit wins: a source wider than the target box is
/// constrained by height, otherwise by width.
pub fn pick_constraint(stored: (u32, u32), target: DecodeSize) -> Constraint {
    let (src_w, src_h) = stored;
    if src_w == 0 || src_h == 0 {
        return Constraint::None;
    }
    match (target.width, target.height) {
        (0, 0) => Constraint::None,
        (0, h) => Constraint::Height(h),
        (w, 0) => Constraint::Width(w),
        (w, h) => {
            let src_ratio = src_w as f64 / src_h as f64;
            let tgt_ratio = w as f64 / h as f64;
            if src_ratio > tgt_ratio {
                Constraint::Height(h)
            } else {
                Constraint::Width(w)
            }
        }
    }
}

/// Final decoded dimensions for a constraint, preserving the source ratio.
///
/// The derived axis is rounded and never drops below 1 pixel.
pub fn constrained_dimensions(stored: (u32, u32), constraint: Constraint) -> (u32, u32) {
    let (src_w, src_h) = stored;
    let derive = |num: u32, a: u32, b: u32| ((num as f64 * a as f64 / b as f64).round() as u32).max(1);
    match constraint {
        Constraint::None => stored,
        Constraint::Width(w) => (w, derive(w, src_h, src_w)),
        Constraint::Height(h) => (derive(h, src_w, src_h), h),
    }
}

/// Stored-pixel dimensions to decode at, from intrinsic size, request and
/// orientation. Combines [`effective_target`], [`pick_constraint`] and
/// [`constrained_dimensions`].
pub fn decode_dimensions(stored: (u32, u32), requested: DecodeSize, orientation: u16) -> (u32, u32) {
    let target = effective_target(stored, requested, orientation);
    constrained_dimensions(stored, pick_constraint(stored, target))
}
