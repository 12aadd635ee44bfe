//! Image decoding, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` (header only) |
//! | **EXIF** | `kamadak-exif` (orientation, date, camera) |
//! | **Decode + downscale** | `image` decode + Lanczos3 `resize_exact` |
//! | **Orient** | `rotate90/180/270`, `fliph`, `flipv` |
//! | **Cache encoding** | PNG via `image` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Metadata**: EXIF reading
//! - **Decode**: The byte-to-bitmap pipeline

pub mod calculations;
pub mod decode;
pub mod metadata;

pub use decode::{DecodeError, apply_orientation, decode, intrinsic_dimensions};
pub use metadata::{ImageInfo, read_image_info, read_orientation};
