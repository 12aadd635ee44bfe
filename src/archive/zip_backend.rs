//! Zip archives via the `zip` crate.
//!
//! Zip encrypts entry data, not the central directory, so [`ZipBackend::open`]
//! succeeds for any readable zip and the password is only checked when an
//! entry is extracted. Both ZipCrypto and AES entries are handled by
//! `by_name_decrypt`.
//!
//! rar and 7z files are classified as archives elsewhere but are not zip
//! containers; opening one fails with [`ArchiveError::Unsupported`], which the
//! cascade treats like a wrong password.

use super::{ArchiveBackend, ArchiveError, ArchiveHandle, EntryMeta};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

/// Largest entry we are willing to inflate into memory.
pub const MAX_ENTRY_SIZE: u64 = 1 << 31;

/// Upper bound on the up-front buffer reservation. The declared size is only
/// a hint; the buffer grows past this as real bytes arrive.
const PREALLOC_LIMIT: u64 = 64 << 20;

/// Map a zip error onto the cascade's error classes.
fn map_zip_error(error: ZipError) -> ArchiveError {
    match error {
        ZipError::Io(e) => ArchiveError::Io(e),
        ZipError::InvalidPassword => ArchiveError::BadPassword,
        ZipError::UnsupportedArchive(detail) if detail == ZipError::PASSWORD_REQUIRED => {
            ArchiveError::BadPassword
        }
        ZipError::UnsupportedArchive(detail) => ArchiveError::Unsupported(detail.to_string()),
        ZipError::InvalidArchive(detail) => ArchiveError::Corrupt(detail.to_string()),
        ZipError::FileNotFound => ArchiveError::EntryNotFound(String::new()),
        other => ArchiveError::Corrupt(other.to_string()),
    }
}

/// Errors while streaming entry data. A ZipCrypto password can pass the
/// one-byte header check and still be wrong; that surfaces here as invalid
/// data or a checksum mismatch, not as an I/O fault.
fn map_read_error(error: std::io::Error) -> ArchiveError {
    match error.kind() {
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::InvalidInput => {
            ArchiveError::Corrupt(error.to_string())
        }
        _ => ArchiveError::Io(error),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Production [`ArchiveBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipBackend;

impl ZipBackend {
    pub fn new() -> Self {
        Self
    }
}

struct ZipHandle {
    archive: ZipArchive<BufReader<File>>,
    entries: Vec<EntryMeta>,
    password: Option<String>,
}

impl ArchiveBackend for ZipBackend {
    fn open(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Box<dyn ArchiveHandle + '_>, ArchiveError> {
        if has_extension(path, "rar") || has_extension(path, "7z") {
            return Err(ArchiveError::Unsupported(format!(
                "{} is not a zip container",
                path.display()
            )));
        }
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(map_zip_error)?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(map_zip_error)?;
            entries.push(EntryMeta {
                name: entry.name().to_string(),
                is_dir: entry.is_dir(),
                size: entry.size(),
                compressed_size: entry.compressed_size(),
                encrypted: entry.encrypted(),
            });
        }

        Ok(Box::new(ZipHandle {
            archive,
            entries,
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
        }))
    }
}

impl ArchiveHandle for ZipHandle {
    fn entries(&self) -> &[EntryMeta] {
        &self.entries
    }

    fn extract(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let entry = match &self.password {
            Some(pw) => self.archive.by_name_decrypt(name, pw.as_bytes()),
            None => self.archive.by_name(name),
        };
        let mut entry = entry.map_err(|e| match map_zip_error(e) {
            ArchiveError::EntryNotFound(_) => ArchiveError::EntryNotFound(name.to_string()),
            other => other,
        })?;
        // Sizes come from the archive headers and may be forged.
        if entry.size() > MAX_ENTRY_SIZE {
            return Err(ArchiveError::Corrupt(format!(
                "{name} declares {} bytes",
                entry.size()
            )));
        }
        let mut buf = Vec::with_capacity(entry.size().min(PREALLOC_LIMIT) as usize);
        (&mut entry)
            .take(MAX_ENTRY_SIZE + 1)
            .read_to_end(&mut buf)
            .map_err(map_read_error)?;
        if buf.len() as u64 > MAX_ENTRY_SIZE {
            return Err(ArchiveError::Corrupt(format!("{name} inflates past its limit")));
        }
        Ok(buf)
    }
}
