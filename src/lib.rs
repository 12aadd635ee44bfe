//! # zipview
//!
//! The load-and-cache core of an image browser that treats directories and
//! archives (optionally password-protected) alike, as containers of images.
//!
//! # Architecture: Load Pipeline
//!
//! ```text
//! Loader::load(options)
//!   ├── plain image ─────────────────────────────► decode ──┐
//!   └── archive ──► password cascade ──► extraction ──┬──► decode ──┤
//!                   known → empty → fallbacks → prompt └──► cache ──┤
//!                                                                   ▼
//!                                          ObjectInfo + entry callbacks
//! ```
//!
//! Every decode holds a [`throttle::DecodePermit`]; thumbnails at the
//! configured size are read from and written to the SQLite cache.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`load`] | [`Loader`](load::Loader): the single entry point, plus listing, per-entry image and extraction helpers |
//! | [`password`] | The four-stage password cascade and the prompt interface |
//! | [`archive`] | Archive backend trait, zip backend, and the per-attempt extraction adapter |
//! | [`imaging`] | Decode pipeline: dimensions, EXIF orientation, downscale, PNG cache encoding |
//! | [`cache`] | SQLite thumbnail store keyed by (virtual path, width, height) |
//! | [`credentials`] | SQLite password store: per-archive mapping and fallback list |
//! | [`throttle`] | Process-wide counting gate around decodes |
//! | [`warm`] | Directory cache warm-up on a bounded rayon pool |
//! | [`scan`] | Directory children and recursive discovery |
//! | [`natural`] | Numeric-aware name ordering |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`types`] | Shared types: `ObjectInfo`, `LoadOptions`, `FileFlags`, `CancelToken` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Outcomes Instead of Caught Errors
//!
//! An extraction attempt returns [`archive::ExtractOutcome`]: success, a soft
//! failure (wrong password, unsupported or corrupt container) that moves the
//! cascade on, or a fatal error that ends it. Only fatal I/O ever reaches the
//! caller as `Err`; a cascade that runs out of passwords reports through the
//! error flag on the returned [`types::ObjectInfo`].
//!
//! ## Injected Stores
//!
//! The thumbnail cache and credential store are traits handed to the loader,
//! not globals. Each implementation serializes its own access with one mutex
//! and swallows its own errors, since a broken cache must never block a load.
//!
//! ## One Cached Size per Image
//!
//! A cache write deletes every row for the virtual path before inserting, so
//! each image keeps only its most recent thumbnail size. Requests at a size
//! other than the configured thumbnail size bypass the cache entirely.
//!
//! ## Success Means "The Password Worked"
//!
//! An extraction attempt succeeds once the archive opened and every target
//! entry was visited, even if some entries failed to decode. Those entries
//! are reported through the entry callback without an image.

pub mod archive;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod db;
pub mod imaging;
pub mod load;
pub mod natural;
pub mod output;
pub mod password;
pub mod scan;
pub mod throttle;
pub mod types;
pub mod warm;

pub use load::{LoadError, Loader};
pub use types::{CancelToken, DecodeSize, FileFlags, LoadOptions, ObjectInfo};

#[cfg(test)]
pub(crate) mod test_helpers;
