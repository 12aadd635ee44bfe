//! Durable thumbnail cache.
//!
//! Decoding a full-size JPEG out of an archive costs tens of milliseconds;
//! reading a small PNG row back costs well under one. This module stores
//! thumbnail-sized decodes so the next visit to a folder or archive skips
//! extraction and decoding entirely.
//!
//! # Design
//!
//! ## Keys
//!
//! A row is keyed by `(virtual_path, decode_width, decode_height)`. The
//! virtual path is the container path joined with the entry name:
//!
//! ```text
//! /photos/trip.zip/day1/001.jpg     (archive entry)
//! /photos/loose/002.png             (plain file: parent dir + file name)
//! ```
//!
//! ## Replace semantics
//!
//! [`put`](ThumbnailCache::put) deletes every row for the virtual path, then
//! inserts the new one, inside one transaction. A virtual path therefore
//! holds only its most recent size variant, and [`get`](ThumbnailCache::get)
//! at any other size is a miss. The table has no unique constraint; the
//! delete-then-insert pattern is what keeps one row per path.
//!
//! ## Failure policy
//!
//! The cache is secondary. Every SQLite error inside an operation is logged
//! at `warn` and reported as "no effect": `put` returns 0 rows, `get` returns
//! `None`. A broken cache never blocks a foreground load.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE thumbs_data (
//!     virtual_path  TEXT NOT NULL,
//!     decode_width  INTEGER,
//!     decode_height INTEGER,
//!     thumb_data    BLOB
//! );
//! ```

use crate::db::{self, StoreError};
use crate::types::DecodeSize;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS thumbs_data (
    virtual_path  TEXT NOT NULL,
    decode_width  INTEGER,
    decode_height INTEGER,
    thumb_data    BLOB
);
CREATE INDEX IF NOT EXISTS thumbs_data_path ON thumbs_data (virtual_path);
";

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbKey {
    pub virtual_path: String,
    pub size: DecodeSize,
}

impl ThumbKey {
    /// Key for `entry` inside `container` (an archive, or a plain file's
    /// parent directory).
    pub fn new(container: &Path, entry: &str, size: DecodeSize) -> Self {
        Self {
            virtual_path: container.join(entry).to_string_lossy().into_owned(),
            size,
        }
    }
}

/// Narrow interface the loader depends on. Implementations serialize their
/// own access and swallow their own errors.
pub trait ThumbnailCache: Send + Sync {
    /// Replace whatever is stored for `key.virtual_path`. Returns rows inserted.
    fn put(&self, key: &ThumbKey, png: &[u8]) -> usize;

    /// Bytes stored under the exact key, size included.
    fn get(&self, key: &ThumbKey) -> Option<Vec<u8>>;

    /// Whether a row exists for the exact key.
    fn contains(&self, key: &ThumbKey) -> bool {
        self.get(key).is_some()
    }
}

/// [`ThumbnailCache`] backed by one SQLite file.
pub struct SqliteThumbnailCache {
    conn: Mutex<Connection>,
}

impl SqliteThumbnailCache {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(db::open(path, SCHEMA)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory(SCHEMA)?),
        })
    }

    /// Total number of stored rows. Returns 0 if the table can't be read.
    pub fn len(&self) -> usize {
        let conn = db::lock(&self.conn);
        conn.query_row("SELECT COUNT(*) FROM thumbs_data", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_put(&self, key: &ThumbKey, png: &[u8]) -> Result<usize, rusqlite::Error> {
        let mut conn = db::lock(&self.conn);
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM thumbs_data WHERE virtual_path = ?1",
            params![key.virtual_path],
        )?;
        let inserted = tx.execute(
            "INSERT INTO thumbs_data (virtual_path, decode_width, decode_height, thumb_data)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.virtual_path, key.size.width, key.size.height, png],
        )?;
        tx.commit()?;
        Ok(inserted)
    }

    fn try_get(&self, key: &ThumbKey) -> Result<Option<Vec<u8>>, rusqlite::Error> {
        let conn = db::lock(&self.conn);
        conn.query_row(
            "SELECT thumb_data FROM thumbs_data
             WHERE virtual_path = ?1 AND decode_width = ?2 AND decode_height = ?3
             LIMIT 1",
            params![key.virtual_path, key.size.width, key.size.height],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()
        .map(Option::flatten)
    }
}

impl ThumbnailCache for SqliteThumbnailCache {
    fn put(&self, key: &ThumbKey, png: &[u8]) -> usize {
        if png.is_empty() {
            return 0;
        }
        self.try_put(key, png).unwrap_or_else(|e| {
            warn!(path = %key.virtual_path, error = %e, "thumbnail cache write failed");
            0
        })
    }

    fn get(&self, key: &ThumbKey) -> Option<Vec<u8>> {
        match self.try_get(key) {
            Ok(bytes) => bytes.filter(|b| !b.is_empty()),
            Err(e) => {
                warn!(path = %key.virtual_path, error = %e, "thumbnail cache read failed");
                None
            }
        }
    }
}
