//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zipview::Loader;
use zipview::archive::{ArchiveBackend, ArchiveError, ArchiveHandle, EntryMeta, ZipBackend};
use zipview::cache::SqliteThumbnailCache;
use zipview::credentials::SqliteCredentialStore;
use zipview::password::{PasswordPrompt, PromptReply};

pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

/// Zip with every entry stored (AES-256 when `password` is set).
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])], password: Option<&str>) {
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, bytes) in entries {
        let options = zip::write::SimpleFileOptions::default();
        match password {
            Some(pw) => zip
                .start_file(*name, options.with_aes_encryption(zip::AesMode::Aes256, pw))
                .unwrap(),
            None => zip.start_file(*name, options).unwrap(),
        }
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// `photos.zip` holding `a.jpg` and `b.png`.
pub fn photos_zip(dir: &Path, password: Option<&str>) -> std::path::PathBuf {
    let path = dir.join("photos.zip");
    let jpg = encoded(640, 480, ImageFormat::Jpeg);
    let png = encoded(200, 100, ImageFormat::Png);
    write_zip(&path, &[("a.jpg", &jpg[..]), ("b.png", &png[..])], password);
    path
}

// =========================================================================
// Recording zip backend
// =========================================================================

/// Real zip access that records passwords and counts extractions.
#[derive(Default)]
pub struct RecordingBackend {
    inner: ZipBackend,
    opens: Mutex<Vec<Option<String>>>,
    extracts: AtomicUsize,
}

impl RecordingBackend {
    pub fn passwords_tried(&self) -> Vec<Option<String>> {
        self.opens.lock().unwrap().clone()
    }

    pub fn extractions(&self) -> usize {
        self.extracts.load(Ordering::SeqCst)
    }
}

struct CountingHandle<'a> {
    inner: Box<dyn ArchiveHandle + 'a>,
    extracts: &'a AtomicUsize,
}

impl ArchiveHandle for CountingHandle<'_> {
    fn entries(&self) -> &[EntryMeta] {
        self.inner.entries()
    }

    fn extract(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        self.extracts.fetch_add(1, Ordering::SeqCst);
        self.inner.extract(name)
    }
}

impl ArchiveBackend for RecordingBackend {
    fn open(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Box<dyn ArchiveHandle + '_>, ArchiveError> {
        self.opens.lock().unwrap().push(password.map(str::to_string));
        let inner = self.inner.open(path, password)?;
        Ok(Box::new(CountingHandle {
            inner,
            extracts: &self.extracts,
        }))
    }
}

// =========================================================================
// Prompt
// =========================================================================

pub struct FixedPrompt {
    pub reply: Option<PromptReply>,
    pub asked: AtomicUsize,
}

impl FixedPrompt {
    pub fn new(password: &str, remember: bool) -> Self {
        Self {
            reply: Some(PromptReply::new(password, remember)),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl PasswordPrompt for FixedPrompt {
    fn ask(&self, _archive: &Path) -> Option<PromptReply> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

// =========================================================================
// Environment
// =========================================================================

/// File-backed stores in a temp dir plus a recording backend.
pub struct Env {
    pub dir: TempDir,
    pub thumbs: Arc<SqliteThumbnailCache>,
    pub credentials: Arc<SqliteCredentialStore>,
    pub backend: Arc<RecordingBackend>,
}

impl Env {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let thumbs = Arc::new(SqliteThumbnailCache::open(&dir.path().join("db/thumbs.sqlite")).unwrap());
        let credentials =
            Arc::new(SqliteCredentialStore::open(&dir.path().join("db/credentials.sqlite")).unwrap());
        Self {
            dir,
            thumbs,
            credentials,
            backend: Arc::new(RecordingBackend::default()),
        }
    }

    pub fn loader(&self) -> Loader {
        Loader::new(self.thumbs.clone(), self.credentials.clone()).with_archives(self.backend.clone())
    }
}
