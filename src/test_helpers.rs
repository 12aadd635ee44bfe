//! Shared test utilities.
//!
//! Provides encoded image fixtures, zip archive builders, a scripted password
//! prompt, and [`TestLoader`], a [`Loader`] wired to in-memory stores.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let t = TestLoader::new();
//! t.credentials.add_fallback("hunter2");
//! let info = t.loader.load(&LoadOptions::new(path), &CancelToken::new());
//! assert!(t.thumbs.is_empty());
//! ```

use crate::archive::ArchiveBackend;
use crate::cache::SqliteThumbnailCache;
use crate::credentials::SqliteCredentialStore;
use crate::load::Loader;
use crate::password::{PasswordPrompt, PromptReply};
use crate::throttle::Throttle;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Image fixtures
// =========================================================================

/// Gradient so encoders can't collapse the image to nothing.
fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded.
pub const ORIENT6_JPEG: &str = concat!(
    "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
    "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
);

pub fn orient6_jpeg() -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(ORIENT6_JPEG)
        .unwrap()
}

// =========================================================================
// Archives
// =========================================================================

/// Write a zip at `path`. Names ending in `/` become directories. With a
/// password every file entry is AES-256 encrypted.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])], password: Option<&str>) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, bytes) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            continue;
        }
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

// =========================================================================
// Prompt
// =========================================================================

/// Replays canned replies, then behaves like a cancelled dialog.
pub struct ScriptedPrompt {
    replies: Mutex<VecDeque<Option<PromptReply>>>,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(replies: Vec<Option<PromptReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl PasswordPrompt for ScriptedPrompt {
    fn ask(&self, _archive: &Path) -> Option<PromptReply> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.replies.lock().unwrap().pop_front().flatten()
    }
}

// =========================================================================
// Loader
// =========================================================================

/// A [`Loader`] over in-memory stores, with handles kept for assertions.
pub struct TestLoader {
    pub loader: Loader,
    pub thumbs: Arc<SqliteThumbnailCache>,
    pub credentials: Arc<SqliteCredentialStore>,
}

impl TestLoader {
    /// Real zip backend, private throttle.
    pub fn new() -> Self {
        let thumbs = Arc::new(SqliteThumbnailCache::open_in_memory().unwrap());
        let credentials = Arc::new(SqliteCredentialStore::open_in_memory().unwrap());
        let loader = Loader::new(thumbs.clone(), credentials.clone()).with_throttle(Throttle::new(4));
        Self {
            loader,
            thumbs,
            credentials,
        }
    }

    pub fn with_archives(archives: Arc<dyn ArchiveBackend>) -> Self {
        let mut t = Self::new();
        t.loader = t.loader.with_archives(archives);
        t
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn PasswordPrompt>) -> Self {
        self.loader = self.loader.with_prompt(prompt);
        self
    }
}
