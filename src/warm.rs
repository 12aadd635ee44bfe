//! Cache warm-up: pre-generate the first thumbnail of every item in a
//! directory.
//!
//! ```text
//! children(dir) ──► rayon pool (cores/2, 1..=6)
//!                     per item: cancelled? → stop
//!                               source_paths → first entry
//!                               cached?      → count, next
//!                               image_for    → decode + store
//!                               progress event
//! ```
//!
//! Workers check the [`CancelToken`] before each item; an item already
//! started runs to completion. [`WarmSlot`] keeps at most one warm-up alive
//! per owner: starting a new one cancels its predecessor and waits for it.

use crate::load::Loader;
use crate::scan;
use crate::types::{CancelToken, FileFlags, ObjectInfo};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MAX_WORKERS: usize = 6;

/// Half the cores, at least 1 and at most [`MAX_WORKERS`].
pub fn worker_count(cores: usize) -> usize {
    (cores / 2).clamp(1, MAX_WORKERS)
}

#[derive(Error, Debug)]
pub enum WarmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmStatus {
    /// Thumbnail was already stored.
    Cached,
    Decoded,
    /// Nothing to show: empty directory or archive.
    Skipped,
    Failed,
}

/// Progress report sent after each item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmEvent {
    pub path: PathBuf,
    pub status: WarmStatus,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmSummary {
    pub total: usize,
    pub decoded: usize,
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl WarmSummary {
    pub fn processed(&self) -> usize {
        self.decoded + self.cached + self.skipped + self.failed
    }
}

impl fmt::Display for WarmSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} decoded, {} cached, {} skipped, {} failed ({} total)",
            self.decoded, self.cached, self.skipped, self.failed, self.total
        )?;
        if self.cancelled {
            write!(f, ", cancelled after {}", self.processed())?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    decoded: AtomicUsize,
    cached: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record(&self, status: WarmStatus) -> usize {
        let counter = match status {
            WarmStatus::Cached => &self.cached,
            WarmStatus::Decoded => &self.decoded,
            WarmStatus::Skipped => &self.skipped,
            WarmStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn warm_one(loader: &Loader, path: &Path, flags: FileFlags) -> WarmStatus {
    let mut info = ObjectInfo::new(path, flags);
    let first = match loader.source_paths(&mut info) {
        Ok(paths) => paths.first().cloned(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot list");
            return WarmStatus::Failed;
        }
    };
    if info.has_error() {
        return WarmStatus::Failed;
    }
    let Some(first) = first else {
        return WarmStatus::Skipped;
    };
    if loader.has_thumbnail(info.container_path(), &first) {
        return WarmStatus::Cached;
    }
    match loader.image_for(&mut info, Some(&first), loader.thumbnail_size(), false) {
        Some(_) => WarmStatus::Decoded,
        None => WarmStatus::Failed,
    }
}

/// Warm the thumbnail cache for the immediate children of `dir`.
pub fn warm_cache(
    loader: &Loader,
    dir: &Path,
    cancel: &CancelToken,
    workers: usize,
    progress: Option<Sender<WarmEvent>>,
) -> Result<WarmSummary, WarmError> {
    let items = scan::children(dir)?;
    let total = items.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;
    info!(dir = %dir.display(), total, workers, "warming thumbnail cache");

    let counters = Counters::default();
    pool.install(|| {
        items.par_iter().for_each(|(path, flags)| {
            if cancel.is_cancelled() {
                return;
            }
            let status = warm_one(loader, path, *flags);
            let completed = counters.record(status);
            debug!(path = %path.display(), ?status, completed, total, "warmed");
            if let Some(tx) = &progress {
                let _ = tx.send(WarmEvent {
                    path: path.clone(),
                    status,
                    completed,
                    total,
                });
            }
        });
    });

    Ok(WarmSummary {
        total,
        decoded: counters.decoded.into_inner(),
        cached: counters.cached.into_inner(),
        skipped: counters.skipped.into_inner(),
        failed: counters.failed.into_inner(),
        cancelled: cancel.is_cancelled(),
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one warm-up at a time, cancelling the previous one on each start.
#[derive(Default)]
pub struct WarmSlot {
    current: Mutex<Option<CancelToken>>,
    running: Mutex<()>,
}

impl WarmSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is running, wait for it, then run `job` with a fresh
    /// token.
    pub fn run<T>(&self, job: impl FnOnce(&CancelToken) -> T) -> T {
        let token = CancelToken::new();
        if let Some(previous) = lock(&self.current).replace(token.clone()) {
            debug!("cancelling previous warm-up");
            previous.cancel();
        }
        let result = {
            let _running = lock(&self.running);
            job(&token)
        };
        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|c| c.same(&token)) {
            *current = None;
        }
        result
    }

    /// Cancel the running warm-up, if any.
    pub fn cancel(&self) {
        if let Some(token) = lock(&self.current).take() {
            token.cancel();
        }
    }
}
