//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## list
//!
//! ```text
//! photos.zip (archive, 3 images)
//!     001 a.jpg
//!     002 b2.png
//!     003 b10.png
//! ```
//!
//! A failed container adds an indented `Error:` line.
//!
//! ## all
//!
//! ```text
//! 001 image    top.jpg
//! 002 archive  trip/day2.zip
//! ```
//!
//! ## info
//!
//! ```text
//! a.jpg
//!     Size: 4000x3000
//!     Orientation: 6
//!     Taken: 2021:06:01 10:22:33
//! ```
//!
//! ## warm
//!
//! ```text
//! [ 3/12] decoded  album/
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::ImageInfo;
use crate::types::{FileFlags, ObjectInfo};
use crate::warm::{WarmEvent, WarmStatus};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn kind_label(flags: FileFlags) -> &'static str {
    let kind = flags.kind();
    if kind == FileFlags::DIRECTORY {
        "directory"
    } else if kind == FileFlags::ARCHIVE {
        "archive"
    } else if kind == FileFlags::IMAGE {
        "image"
    } else if kind == (FileFlags::ARCHIVE | FileFlags::IMAGE) {
        "entry"
    } else {
        "unknown"
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn format_bytes(n: u64) -> String {
    match n {
        0..1024 => format!("{n} B"),
        1024..1_048_576 => format!("{:.1} KiB", n as f64 / 1024.0),
        _ => format!("{:.1} MiB", n as f64 / 1_048_576.0),
    }
}

// ============================================================================
// list
// ============================================================================

/// Header plus one indexed line per entry.
pub fn format_listing(info: &ObjectInfo, entries: &[String]) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}, {})",
        info.file_name,
        kind_label(info.flags),
        plural(entries.len(), "image")
    )];
    if info.has_error() {
        lines.push(format!(
            "{}Error: {}",
            indent(1),
            info.comments.as_deref().unwrap_or("unknown")
        ));
    }
    for (i, entry) in entries.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), entry));
    }
    lines
}

pub fn print_listing(info: &ObjectInfo, entries: &[String]) {
    for line in format_listing(info, entries) {
        println!("{}", line);
    }
}

// ============================================================================
// all
// ============================================================================

/// One line per object, paths shown relative to `root`.
pub fn format_all(objects: &[ObjectInfo], root: &Path) -> Vec<String> {
    objects
        .iter()
        .enumerate()
        .map(|(i, o)| {
            let rel = o
                .file_system_path
                .strip_prefix(root)
                .unwrap_or(&o.file_system_path);
            format!(
                "{} {:<8} {}",
                format_index(i + 1),
                kind_label(o.flags),
                rel.display()
            )
        })
        .collect()
}

pub fn print_all(objects: &[ObjectInfo], root: &Path) {
    for line in format_all(objects, root) {
        println!("{}", line);
    }
}

// ============================================================================
// info
// ============================================================================

pub fn format_info(name: &str, info: &ImageInfo) -> Vec<String> {
    let mut lines = vec![
        name.to_string(),
        format!("{}Size: {}x{}", indent(1), info.width, info.height),
        format!("{}File size: {}", indent(1), format_bytes(info.file_size)),
    ];
    if info.orientation != 1 {
        lines.push(format!("{}Orientation: {}", indent(1), info.orientation));
    }
    if let Some(date) = &info.date_taken {
        lines.push(format!("{}Taken: {}", indent(1), date));
    }
    if let Some(camera) = &info.camera {
        lines.push(format!("{}Camera: {}", indent(1), camera));
    }
    if let Some(software) = &info.software {
        lines.push(format!("{}Software: {}", indent(1), software));
    }
    lines
}

pub fn print_info(name: &str, info: &ImageInfo) {
    for line in format_info(name, info) {
        println!("{}", line);
    }
}

// ============================================================================
// warm
// ============================================================================

pub fn format_warm_event(event: &WarmEvent, root: &Path) -> String {
    let status = match event.status {
        WarmStatus::Cached => "cached",
        WarmStatus::Decoded => "decoded",
        WarmStatus::Skipped => "skipped",
        WarmStatus::Failed => "failed",
    };
    let width = event.total.to_string().len();
    let rel = event.path.strip_prefix(root).unwrap_or(&event.path);
    format!(
        "[{:>width$}/{}] {:<8} {}",
        event.completed,
        event.total,
        status,
        rel.display()
    )
}

// ============================================================================
// passwords
// ============================================================================

pub fn format_passwords(archives: &[impl AsRef<Path>], fallbacks: &[String]) -> Vec<String> {
    let mut lines = vec![format!("Archives ({})", archives.len())];
    for (i, path) in archives.iter().enumerate() {
        lines.push(format!(
            "{}{} {}",
            indent(1),
            format_index(i + 1),
            path.as_ref().display()
        ));
    }
    lines.push(format!("Fallbacks ({})", fallbacks.len()));
    for (i, pw) in fallbacks.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), pw));
    }
    lines
}

pub fn print_passwords(archives: &[impl AsRef<Path>], fallbacks: &[String]) {
    for line in format_passwords(archives, fallbacks) {
        println!("{}", line);
    }
}
