//! Shared types passed between the loader, the password cascade, the archive
//! adapter and the cache walker.
//!
//! | Type | Role |
//! |------|------|
//! | [`FileFlags`] | What a path is: image, archive, directory, or an in-archive image |
//! | [`DecodeSize`] | Requested decode size; `0x0` means intrinsic size |
//! | [`ObjectInfo`] | A file-system object or archive entry, plus what was resolved for it |
//! | [`LoadOptions`] | One immutable load request, including its two callbacks |
//! | [`CancelToken`] | Cooperative cancellation shared between caller and workers |

use image::DynamicImage;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A decoded, oriented bitmap. Immutable once produced, so it is shared by `Arc`.
pub type Bitmap = Arc<DynamicImage>;

/// Callback receiving a finished [`ObjectInfo`].
pub type Callback = Arc<dyn Fn(&ObjectInfo) + Send + Sync>;

/// Extensions decoded as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "tiff", "bmp"];

/// Extensions opened as archives (compared case-insensitively).
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z"];

// =============================================================================
// FileFlags
// =============================================================================

/// Bit set describing the kind of an object.
///
/// `ARCHIVE | IMAGE` marks an image living inside an archive. `ERROR` is only
/// ever added, never cleared, while a load is running.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileFlags(u8);

impl FileFlags {
    pub const UNKNOWN: Self = Self(0);
    pub const IMAGE: Self = Self(1);
    pub const ARCHIVE: Self = Self(1 << 1);
    pub const DIRECTORY: Self = Self(1 << 2);
    pub const ERROR: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// A plain image on disk (not an entry inside an archive).
    pub fn is_plain_image(self) -> bool {
        self.contains(Self::IMAGE) && !self.contains(Self::ARCHIVE)
    }

    /// The kind without the `ERROR` bit.
    pub fn kind(self) -> Self {
        Self(self.0 & !Self::ERROR.0)
    }
}

impl BitOr for FileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FileFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FileFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("UNKNOWN");
        }
        let names = [
            (Self::IMAGE, "IMAGE"),
            (Self::ARCHIVE, "ARCHIVE"),
            (Self::DIRECTORY, "DIRECTORY"),
            (Self::ERROR, "ERROR"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&set.join(" | "))
    }
}

/// Classify a file name by extension.
///
/// Returns [`FileFlags::IMAGE`], [`FileFlags::ARCHIVE`], or
/// [`FileFlags::UNKNOWN`]. Works on archive entry names too (`"sub/a.JPG"`).
pub fn file_type(name: &str) -> FileFlags {
    let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) else {
        return FileFlags::UNKNOWN;
    };
    let ext = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        FileFlags::IMAGE
    } else if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
        FileFlags::ARCHIVE
    } else {
        FileFlags::UNKNOWN
    }
}

/// Classify a path on disk: directories first, then by extension.
pub fn path_type(path: &Path) -> FileFlags {
    if path.is_dir() {
        return FileFlags::DIRECTORY;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map(file_type)
        .unwrap_or(FileFlags::UNKNOWN)
}

// =============================================================================
// DecodeSize
// =============================================================================

/// Requested decode size in pixels. `0` on an axis means "unconstrained".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DecodeSize {
    pub width: u32,
    pub height: u32,
}

impl DecodeSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `0x0`: decode at intrinsic size.
    pub fn is_default(self) -> bool {
        self.width == 0 && self.height == 0
    }
}

impl fmt::Display for DecodeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for DecodeSize {
    type Err = String;

    /// Parse `"WxH"`, e.g. `"300x200"` or `"0x480"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid width '{w}'"))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid height '{h}'"))?;
        Ok(Self { width, height })
    }
}

// =============================================================================
// ObjectInfo
// =============================================================================

/// A directory, archive, image, or archive entry, with whatever the loader
/// resolved for it.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Physical path of the directory, archive or image on disk.
    pub file_system_path: PathBuf,
    /// Identity of the object: the physical path, joined with the entry name
    /// for archive entries.
    pub virtual_path: PathBuf,
    pub file_name: String,
    pub flags: FileFlags,
    /// Entry names for containers. `None` until resolved, filled at most once.
    pub source_paths: Option<Vec<String>>,
    /// Decoded bitmap. Only set for resolved images.
    pub image: Option<Bitmap>,
    pub comments: Option<String>,
}

impl ObjectInfo {
    pub fn new(path: impl Into<PathBuf>, flags: FileFlags) -> Self {
        let file_system_path = path.into();
        let file_name = file_system_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            virtual_path: file_system_path.clone(),
            file_system_path,
            file_name,
            flags,
            source_paths: None,
            image: None,
            comments: None,
        }
    }

    /// An image inside an archive.
    pub fn archive_entry(archive: &Path, entry: &str, image: Option<Bitmap>) -> Self {
        Self {
            file_system_path: archive.to_path_buf(),
            virtual_path: archive.join(entry),
            file_name: entry.to_string(),
            flags: FileFlags::ARCHIVE | FileFlags::IMAGE,
            source_paths: Some(vec![entry.to_string()]),
            image,
            comments: None,
        }
    }

    /// The container whose entries `source_paths` names.
    ///
    /// For a plain image that is its parent directory, so that
    /// `(container_path, file_name)` addresses the same cache row as the
    /// directory listing that contains it.
    pub fn container_path(&self) -> &Path {
        if self.flags.kind() == FileFlags::IMAGE {
            self.file_system_path.parent().unwrap_or(Path::new(""))
        } else {
            &self.file_system_path
        }
    }

    /// Fill `source_paths` if it is still unresolved. Returns the stored list.
    pub fn fill_source_paths(&mut self, paths: Vec<String>) -> &[String] {
        self.source_paths.get_or_insert(paths)
    }

    pub fn mark_error(&mut self, comment: impl Into<String>) {
        self.flags |= FileFlags::ERROR;
        self.comments = Some(comment.into());
    }

    pub fn has_error(&self) -> bool {
        self.flags.contains(FileFlags::ERROR)
    }
}

// =============================================================================
// LoadOptions
// =============================================================================

/// One load request. Built by the caller, never mutated by the loader.
#[derive(Clone)]
pub struct LoadOptions {
    pub path: PathBuf,
    pub flags: FileFlags,
    pub decode_size: DecodeSize,
    /// Password known to the caller. Tried first, ahead of the stored one.
    pub password: Option<String>,
    /// Explicit entries to load. `None` means every image entry.
    pub file_names: Option<Vec<String>>,
    /// Decode pixels. When false only the entry list is produced.
    pub load_image: bool,
    pub try_cache: bool,
    /// Called once with the container result.
    pub on_container: Option<Callback>,
    /// Called once per processed archive entry.
    pub on_entry: Option<Callback>,
}

impl LoadOptions {
    /// A metadata-only request, with flags detected from the path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            flags: path_type(&path),
            path,
            decode_size: DecodeSize::default(),
            password: None,
            file_names: None,
            load_image: false,
            try_cache: true,
            on_container: None,
            on_entry: None,
        }
    }

    pub fn flags(mut self, flags: FileFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn decode_size(mut self, size: DecodeSize) -> Self {
        self.decode_size = size;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn file_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn load_image(mut self, load: bool) -> Self {
        self.load_image = load;
        self
    }

    pub fn try_cache(mut self, try_cache: bool) -> Self {
        self.try_cache = try_cache;
        self
    }

    pub fn on_container(mut self, f: impl Fn(&ObjectInfo) + Send + Sync + 'static) -> Self {
        self.on_container = Some(Arc::new(f));
        self
    }

    pub fn on_entry(mut self, f: impl Fn(&ObjectInfo) + Send + Sync + 'static) -> Self {
        self.on_entry = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("decode_size", &self.decode_size)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("file_names", &self.file_names)
            .field("load_image", &self.load_image)
            .field("try_cache", &self.try_cache)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CancelToken
// =============================================================================

/// Cooperative cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Whether both handles share one flag.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
