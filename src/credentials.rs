//! Persisted archive passwords.
//!
//! Two key spaces share one store (and one lock):
//!
//! | Table | Contents | Written when |
//! |---|---|---|
//! | `mapped_passwords` | archive path → last password that worked | an archive entry is extracted with a non-empty password |
//! | `fallback_passwords` | passwords tried against any archive, in insertion order | the user opts in after a prompted password works |
//!
//! Like the thumbnail cache, every operation swallows SQLite errors: lookups
//! come back empty and writes report 0 rows.

use crate::db::{self, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mapped_passwords (
    path     TEXT PRIMARY KEY NOT NULL,
    password TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fallback_passwords (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    password TEXT NOT NULL UNIQUE
);
";

/// Password lookups and updates used by the cascade.
pub trait CredentialStore: Send + Sync {
    /// The password that last opened `archive`.
    fn mapped(&self, archive: &Path) -> Option<String>;

    /// Insert or overwrite the password for `archive`.
    fn set_mapped(&self, archive: &Path, password: &str) -> usize;

    fn forget_mapped(&self, archive: &Path) -> usize;

    /// Fallback passwords in the order they were added.
    fn fallbacks(&self) -> Vec<String>;

    /// Append a fallback. Adding an existing one changes nothing.
    fn add_fallback(&self, password: &str) -> usize;

    fn remove_fallback(&self, password: &str) -> usize;
}

/// [`CredentialStore`] backed by one SQLite file.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

fn path_key(archive: &Path) -> String {
    archive.to_string_lossy().into_owned()
}

fn swallow<T>(what: &str, result: Result<T, rusqlite::Error>, default: T) -> T {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "credential store {what} failed");
        default
    })
}

impl SqliteCredentialStore {
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

    /// Every archive with a stored password, in path order.
    pub fn mapped_archives(&self) -> Vec<PathBuf> {
        swallow("listing", self.try_mapped_archives(), Vec::new())
    }

    fn try_mapped_archives(&self) -> Result<Vec<PathBuf>, rusqlite::Error> {
        let conn = db::lock(&self.conn);
        let mut stmt = conn.prepare("SELECT path FROM mapped_passwords ORDER BY path")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0).map(PathBuf::from))?;
        rows.collect()
    }

    fn try_fallbacks(&self) -> Result<Vec<String>, rusqlite::Error> {
        let conn = db::lock(&self.conn);
        let mut stmt = conn.prepare("SELECT password FROM fallback_passwords ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect()
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn mapped(&self, archive: &Path) -> Option<String> {
        let conn = db::lock(&self.conn);
        let result = conn
            .query_row(
                "SELECT password FROM mapped_passwords WHERE path = ?1",
                params![path_key(archive)],
                |row| row.get::<_, String>(0),
            )
            .optional();
        swallow("lookup", result, None)
    }

    fn set_mapped(&self, archive: &Path, password: &str) -> usize {
        let conn = db::lock(&self.conn);
        let result = conn.execute(
            "INSERT INTO mapped_passwords (path, password) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET password = excluded.password",
            params![path_key(archive), password],
        );
        swallow("write", result, 0)
    }

    fn forget_mapped(&self, archive: &Path) -> usize {
        let conn = db::lock(&self.conn);
        let result = conn.execute(
            "DELETE FROM mapped_passwords WHERE path = ?1",
            params![path_key(archive)],
        );
        swallow("delete", result, 0)
    }

    fn fallbacks(&self) -> Vec<String> {
        swallow("listing", self.try_fallbacks(), Vec::new())
    }

    fn add_fallback(&self, password: &str) -> usize {
        let conn = db::lock(&self.conn);
        let result = conn.execute(
            "INSERT OR IGNORE INTO fallback_passwords (password) VALUES (?1)",
            params![password],
        );
        swallow("write", result, 0)
    }

    fn remove_fallback(&self, password: &str) -> usize {
        let conn = db::lock(&self.conn);
        let result = conn.execute(
            "DELETE FROM fallback_passwords WHERE password = ?1",
            params![password],
        );
        swallow("delete", result, 0)
    }
}
