//! The load orchestrator: one entry point for images, directories and
//! archives.
//!
//! ```text
//! load(options)
//!   ├── cancelled?           → Ok(None), no callback
//!   ├── plain image          → cache / read + decode (only with load_image)
//!   ├── archive              → password cascade → extraction adapter
//!   └── on_container(info)   → Ok(Some(info))
//! ```
//!
//! [`Loader`] owns its collaborators behind the narrow traits
//! ([`ThumbnailCache`], [`CredentialStore`], [`ArchiveBackend`],
//! [`PasswordPrompt`]) so tests substitute in-memory stores and a mock
//! archive. Every decode goes through [`Loader::decode_bytes`], which holds a
//! [`Throttle`] permit for its duration.
//!
//! Results are returned as values. The callbacks in [`LoadOptions`] fire on
//! the calling thread; marshalling onto a UI thread is the host's business.

use crate::archive::{ArchiveBackend, ArchiveError, EntryMeta, ZipBackend};
use crate::cache::{SqliteThumbnailCache, ThumbKey, ThumbnailCache};
use crate::config::{self, ViewerConfig};
use crate::credentials::{CredentialStore, SqliteCredentialStore};
use crate::db::StoreError;
use crate::imaging::decode::{decode, decode_png, encode_png};
use crate::natural::sort_natural;
use crate::password::PasswordPrompt;
use crate::scan;
use crate::throttle::Throttle;
use crate::types::{Bitmap, CancelToken, DecodeSize, FileFlags, LoadOptions, ObjectInfo};
use image::DynamicImage;
use std::path::Path;
use std::sync::{Arc, mpsc};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub const DEFAULT_THUMBNAIL_SIZE: DecodeSize = DecodeSize::new(300, 300);

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One archive entry read into memory by [`Loader::extract_file`].
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub entry: EntryMeta,
    pub bytes: Vec<u8>,
}

pub struct Loader {
    pub(crate) thumbs: Arc<dyn ThumbnailCache>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) archives: Arc<dyn ArchiveBackend>,
    pub(crate) prompt: Option<Arc<dyn PasswordPrompt>>,
    pub(crate) throttle: Arc<Throttle>,
    pub(crate) thumbnail_size: DecodeSize,
}

impl Loader {
    /// Zip backend, process-wide throttle, 300x300 thumbnails, no prompt.
    pub fn new(thumbs: Arc<dyn ThumbnailCache>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            thumbs,
            credentials,
            archives: Arc::new(ZipBackend::new()),
            prompt: None,
            throttle: Throttle::global(),
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }

    /// Open both SQLite stores under `data_dir` and apply `config`.
    pub fn from_config(config: &ViewerConfig, data_dir: &Path) -> Result<Self, StoreError> {
        let thumbs = SqliteThumbnailCache::open(&config.thumbnails_path(data_dir))?;
        let credentials = SqliteCredentialStore::open(&config.credentials_path(data_dir))?;
        let throttle = match config.processing.max_decoders {
            Some(_) => Throttle::new(config::effective_decoders(&config.processing)),
            None => Throttle::global(),
        };
        Ok(Self::new(Arc::new(thumbs), Arc::new(credentials))
            .with_throttle(throttle)
            .with_thumbnail_size(config.thumbnail_size()))
    }

    pub fn with_archives(mut self, archives: Arc<dyn ArchiveBackend>) -> Self {
        self.archives = archives;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn PasswordPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_thumbnail_size(mut self, size: DecodeSize) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn thumbnail_size(&self) -> DecodeSize {
        self.thumbnail_size
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    // =========================================================================
    // Entry point
    // =========================================================================

    /// Resolve `options.path`.
    ///
    /// `Ok(None)` means the load was cancelled; no callback fired. A failed
    /// password cascade is `Ok(Some(info))` with the error flag set. Only
    /// fatal I/O is an `Err`.
    pub fn load(
        &self,
        options: &LoadOptions,
        cancel: &CancelToken,
    ) -> Result<Option<ObjectInfo>, LoadError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let mut info = ObjectInfo::new(&options.path, options.flags);

        if options.flags.contains(FileFlags::ARCHIVE) {
            self.resolve_archive(options, &mut info, cancel)?;
        } else if options.flags.is_plain_image() && options.load_image {
            info.image = self.plain_image(&options.path, options.decode_size, options.try_cache)?;
        }

        if cancel.is_cancelled() {
            debug!(path = %options.path.display(), "load cancelled");
            return Ok(None);
        }
        if let Some(callback) = &options.on_container {
            callback(&info);
        }
        Ok(Some(info))
    }

    // =========================================================================
    // Object-level helpers
    // =========================================================================

    /// Entry names of `info`, resolved on first call.
    ///
    /// Directories list their images; archives are listed without decoding;
    /// images name themselves. An unreadable directory sets the error flag
    /// and resolves to an empty list.
    pub fn source_paths<'a>(&self, info: &'a mut ObjectInfo) -> Result<&'a [String], LoadError> {
        if info.source_paths.is_none() {
            let kind = info.flags.kind();
            let paths = if kind == FileFlags::DIRECTORY {
                match scan::image_names(&info.file_system_path) {
                    Ok(names) => names,
                    Err(e) => {
                        warn!(dir = %info.file_system_path.display(), error = %e, "cannot list directory");
                        info.mark_error(e.to_string());
                        Vec::new()
                    }
                }
            } else if kind == FileFlags::ARCHIVE {
                let options = LoadOptions::new(&info.file_system_path).flags(FileFlags::ARCHIVE);
                match self.load(&options, &CancelToken::new())? {
                    Some(listed) => {
                        if listed.has_error() {
                            info.flags |= FileFlags::ERROR;
                            info.comments = listed.comments;
                        }
                        let mut names = listed.source_paths.unwrap_or_default();
                        sort_natural(&mut names);
                        names
                    }
                    None => Vec::new(),
                }
            } else if kind == FileFlags::IMAGE || kind == (FileFlags::ARCHIVE | FileFlags::IMAGE) {
                vec![info.file_name.clone()]
            } else {
                Vec::new()
            };
            info.fill_source_paths(paths);
        }
        Ok(info.source_paths.as_deref().unwrap_or(&[]))
    }

    /// Bitmap for `source_path` inside `info`, at `size`.
    ///
    /// `source_path` names a directory child or archive entry and is ignored
    /// for images. Anything that goes wrong yields `None`; for archives the
    /// load's flags are copied back into `info`.
    pub fn image_for(
        &self,
        info: &mut ObjectInfo,
        source_path: Option<&str>,
        size: DecodeSize,
        try_cache: bool,
    ) -> Option<Bitmap> {
        if info.has_error() {
            return None;
        }
        let kind = info.flags.kind();
        if kind == FileFlags::DIRECTORY {
            let path = info.file_system_path.join(source_path?);
            self.image_from_file(&path, size, try_cache)
        } else if kind == FileFlags::IMAGE {
            self.image_from_file(&info.file_system_path, size, try_cache)
        } else if kind == FileFlags::ARCHIVE {
            let entry = source_path?;
            let (tx, rx) = mpsc::channel();
            let options = LoadOptions::new(&info.file_system_path)
                .flags(FileFlags::ARCHIVE)
                .decode_size(size)
                .file_names([entry])
                .load_image(true)
                .try_cache(try_cache)
                .on_entry(move |e| {
                    let _ = tx.send(e.image.clone());
                });
            match self.load(&options, &CancelToken::new()) {
                Ok(Some(result)) => {
                    info.flags = result.flags;
                    if result.has_error() {
                        info.comments = result.comments;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(archive = %info.file_system_path.display(), %entry, error = %e, "entry load failed");
                }
            }
            rx.try_iter().flatten().next()
        } else if kind == (FileFlags::ARCHIVE | FileFlags::IMAGE) {
            info.image.clone()
        } else {
            None
        }
    }

    /// Bitmap for the `index`-th entry of `info`.
    pub fn image_at(
        &self,
        info: &mut ObjectInfo,
        index: usize,
        size: DecodeSize,
        try_cache: bool,
    ) -> Option<Bitmap> {
        let entry = self.source_paths(info).ok()?.get(index)?.clone();
        self.image_for(info, Some(&entry), size, try_cache)
    }

    /// Decode a plain image file, through the cache at thumbnail size.
    pub fn image_from_file(&self, path: &Path, size: DecodeSize, try_cache: bool) -> Option<Bitmap> {
        match self.plain_image(path, size, try_cache) {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read image");
                None
            }
        }
    }

    /// Read one archive entry into memory.
    ///
    /// Tries the stored password, no password, then every fallback; never
    /// prompts. `Ok(None)` when no password works or the entry is missing.
    pub fn extract_file(&self, archive: &Path, entry: &str) -> Result<Option<ExtractedFile>, LoadError> {
        let mut candidates: Vec<Option<String>> = Vec::new();
        if let Some(pw) = self.credentials.mapped(archive).filter(|p| !p.is_empty()) {
            candidates.push(Some(pw));
        }
        candidates.push(None);
        candidates.extend(self.credentials.fallbacks().into_iter().map(Some));

        for password in &candidates {
            let mut handle = match self.archives.open(archive, password.as_deref()) {
                Ok(handle) => handle,
                Err(e) if e.is_soft() => continue,
                Err(e) => return Err(e.into()),
            };
            let Some(meta) = handle.entries().iter().find(|m| m.name == entry).cloned() else {
                debug!(archive = %archive.display(), %entry, "entry not in archive");
                return Ok(None);
            };
            match handle.extract(entry) {
                Ok(bytes) => {
                    if let Some(pw) = password {
                        self.credentials.set_mapped(archive, pw);
                    }
                    return Ok(Some(ExtractedFile { entry: meta, bytes }));
                }
                Err(ArchiveError::EntryNotFound(_)) => return Ok(None),
                Err(e) if e.is_soft() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        debug!(archive = %archive.display(), %entry, "no password opened entry");
        Ok(None)
    }

    /// Whether the thumbnail for `entry` of `container` is cached.
    pub fn has_thumbnail(&self, container: &Path, entry: &str) -> bool {
        self.thumbs
            .contains(&ThumbKey::new(container, entry, self.thumbnail_size))
    }

    // =========================================================================
    // Decode and cache plumbing
    // =========================================================================

    fn plain_image(
        &self,
        path: &Path,
        size: DecodeSize,
        try_cache: bool,
    ) -> std::io::Result<Option<Bitmap>> {
        let is_thumb = size == self.thumbnail_size;
        let container = path.parent().unwrap_or(Path::new(""));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = ThumbKey::new(container, &name, size);

        if try_cache
            && is_thumb
            && let Some(image) = self.cached_bitmap(&key)
        {
            return Ok(Some(image));
        }

        let bytes = std::fs::read(path)?;
        let image = self.decode_bytes(&bytes, size);
        if is_thumb && let Some(img) = &image {
            self.store_bitmap(&key, img);
        }
        Ok(image)
    }

    /// Decode under a throttle permit.
    pub(crate) fn decode_bytes(&self, bytes: &[u8], size: DecodeSize) -> Option<Bitmap> {
        let _permit = self.throttle.acquire();
        decode(bytes, size).map(Arc::new)
    }

    pub(crate) fn cached_bitmap(&self, key: &ThumbKey) -> Option<Bitmap> {
        let png = self.thumbs.get(key)?;
        trace!(key = %key.virtual_path, "thumbnail cache hit");
        decode_png(&png).map(Arc::new)
    }

    pub(crate) fn store_bitmap(&self, key: &ThumbKey, image: &DynamicImage) {
        let Some(png) = encode_png(image) else {
            return;
        };
        let rows = self.thumbs.put(key, &png);
        trace!(key = %key.virtual_path, rows, "thumbnail stored");
    }
}
