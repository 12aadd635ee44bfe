//! Filesystem discovery.
//!
//! Two views of a directory:
//!
//! - [`children`]: its immediate entries with their kind, as the cache
//!   warmer and directory listings see it
//! - [`get_all`]: every image and archive below it, recursively
//!
//! Both skip hidden files (leading `.`) and order names naturally. The image
//! list behind a directory's source paths ([`image_names`]) keeps them: a
//! `.cover.jpg` is still an image of that directory.

use crate::natural::natural_cmp;
use crate::types::{FileFlags, ObjectInfo, file_type, path_type};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Immediate children of `dir` that are images, archives or directories,
/// in natural order. Hidden entries are skipped.
pub fn children(dir: &Path) -> std::io::Result<Vec<(PathBuf, FileFlags)>> {
    classified(dir, false)
}

fn classified(dir: &Path, with_hidden: bool) -> std::io::Result<Vec<(PathBuf, FileFlags)>> {
    let mut entries: Vec<(PathBuf, FileFlags)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| with_hidden || !is_hidden(&e.file_name().to_string_lossy()))
        .filter_map(|e| {
            let path = e.path();
            let flags = if e.file_type().ok()?.is_dir() {
                FileFlags::DIRECTORY
            } else {
                file_type(&e.file_name().to_string_lossy())
            };
            (!flags.is_unknown()).then_some((path, flags))
        })
        .collect();

    entries.sort_by(|(a, _), (b, _)| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(entries)
}

/// File names of every image directly inside `dir`, hidden ones included,
/// in natural order.
pub fn image_names(dir: &Path) -> std::io::Result<Vec<String>> {
    Ok(classified(dir, true)?
        .into_iter()
        .filter(|(_, flags)| *flags == FileFlags::IMAGE)
        .filter_map(|(path, _)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

/// Every image and archive below `root`, naturally sorted by full path.
///
/// An archive `root` yields itself. Unreadable subdirectories are logged
/// and skipped.
pub fn get_all(root: &Path) -> Vec<ObjectInfo> {
    if !root.is_dir() {
        let flags = path_type(root);
        return if flags == FileFlags::ARCHIVE && root.exists() {
            vec![ObjectInfo::new(root, flags)]
        } else {
            Vec::new()
        };
    }
    let mut found: Vec<ObjectInfo> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let flags = file_type(&e.file_name().to_string_lossy());
            (!flags.is_unknown()).then(|| ObjectInfo::new(e.into_path(), flags))
        })
        .collect();

    found.sort_by(|a, b| {
        natural_cmp(
            &a.file_system_path.to_string_lossy(),
            &b.file_system_path.to_string_lossy(),
        )
    });
    found
}
