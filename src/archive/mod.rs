//! Archive access and the extraction adapter used by the password cascade.
//!
//! | Piece | Role |
//! |---|---|
//! | [`ArchiveBackend`] | Opens an archive with a candidate password |
//! | [`ArchiveHandle`] | Lists entries, extracts one entry to memory; closes on drop |
//! | [`ZipBackend`] | Production backend (`zip` crate, ZipCrypto + AES) |
//! | [`extract`] | The adapter: one cascade attempt over the target entries |
//!
//! Container parsing is delegated entirely to the backend; nothing here knows
//! about zip internals except [`zip_backend`].
//!
//! ## Error classes
//!
//! [`ArchiveError::is_soft`] splits failures the way the cascade needs them:
//!
//! | Error | Soft? | Cascade reaction |
//! |---|---|---|
//! | `BadPassword` | yes | try next password |
//! | `Unsupported` | yes | try next password (ends in the Error flag) |
//! | `Corrupt` | yes | try next password |
//! | `EntryNotFound` | n/a | per-entry failure, attempt continues |
//! | `Io` | no | propagated to the caller |

pub mod extract;
pub mod zip_backend;

pub use extract::ExtractOutcome;
pub use zip_backend::ZipBackend;

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Wrong or missing password")]
    BadPassword,
    #[error("Unsupported archive: {0}")]
    Unsupported(String),
    #[error("Corrupt archive: {0}")]
    Corrupt(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
}

impl ArchiveError {
    /// Failures that mean "this password (or this format) does not work",
    /// as opposed to the archive being unreadable from disk.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::BadPassword | Self::Unsupported(_) | Self::Corrupt(_)
        )
    }
}

/// Listing data for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub is_dir: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub compressed_size: u64,
    pub encrypted: bool,
}

/// An open archive. Dropping it releases the underlying file.
pub trait ArchiveHandle {
    /// Entries in the order the container lists them.
    fn entries(&self) -> &[EntryMeta];

    /// Read one entry fully into memory, decrypting with the handle's password.
    fn extract(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError>;
}

/// Opens archives. `Sync` so one backend serves every rayon worker.
pub trait ArchiveBackend: Send + Sync {
    /// Open `path`. `None` means no password.
    ///
    /// Formats that encrypt their directory reject a wrong password here;
    /// formats that only encrypt entry data (zip) reject it on
    /// [`ArchiveHandle::extract`].
    fn open(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Box<dyn ArchiveHandle + '_>, ArchiveError>;
}
