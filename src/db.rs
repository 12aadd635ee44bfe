//! SQLite plumbing shared by the thumbnail cache and the credential store.
//!
//! Each store owns one [`Connection`] behind one `Mutex`: the mutex is the
//! per-table lock, so every read and write on that store is serialized.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Open (creating if needed) a database file and apply `schema`.
pub(crate) fn open(path: &Path, schema: &str) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    // Two processes sharing a data dir wait instead of failing with SQLITE_BUSY.
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(schema)?;
    Ok(conn)
}

pub(crate) fn open_in_memory(schema: &str) -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(schema)?;
    Ok(conn)
}

/// Lock a store connection, recovering from poisoning. Store calls never
/// panic on their own, so a poisoned lock only means a caller's callback
/// panicked elsewhere while holding it.
pub(crate) fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match conn.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}
