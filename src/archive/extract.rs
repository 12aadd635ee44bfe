//! One extraction attempt against an archive with one candidate password.
//!
//! The password cascade calls [`Loader::extract_images`] once per stage (and
//! once per fallback or prompted password). Each call gets a fresh
//! [`Attempt`]; nothing about the request is mutated between attempts.
//!
//! ## Per-entry flow
//!
//! ```text
//! entry in done? ─yes─► skip
//!      │no
//! load_image? ─no──────────────────────────────┐
//!      │yes                                    │
//! try_cache && thumbnail size? ─yes─► cache hit? ─yes─┐
//!      │no                               │no         │
//!      └──────────► extract + decode ◄───┘           │
//!                   thumbnail size? → write back     │
//!                                                    ▼
//!                              entry callback, mark done
//! ```
//!
//! ## Success policy
//!
//! The attempt succeeds once the archive opened and the loop finished, even
//! if individual entries produced no image. What an attempt really tests is
//! whether the password works; a bad-password error on any entry aborts it as
//! a soft failure instead. The archive handle is dropped on every return path.

use super::ArchiveError;
use crate::cache::ThumbKey;
use crate::load::Loader;
use crate::password::Stage;
use crate::types::{CancelToken, FileFlags, LoadOptions, ObjectInfo, file_type};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of one attempt, branched on by the cascade.
#[derive(Debug)]
pub enum ExtractOutcome {
    Success,
    /// Wrong password, unsupported or corrupt container. Try the next stage.
    SoftFailure(String),
    /// Anything else. Stops the cascade and reaches the caller.
    Fatal(ArchiveError),
}

/// Immutable input of one attempt.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    pub options: &'a LoadOptions,
    /// `None` or empty: open without a password.
    pub password: Option<&'a str>,
    pub stage: Stage,
}

impl Attempt<'_> {
    fn password(&self) -> Option<&str> {
        self.password.filter(|p| !p.is_empty())
    }
}

impl Loader {
    /// Run one attempt. Fills `info.source_paths` and records every processed
    /// entry in `done` so later stages never redo it.
    pub(crate) fn extract_images(
        &self,
        attempt: &Attempt<'_>,
        info: &mut ObjectInfo,
        done: &mut HashSet<String>,
        cancel: &CancelToken,
    ) -> ExtractOutcome {
        if cancel.is_cancelled() {
            return ExtractOutcome::SoftFailure("cancelled".into());
        }
        let opts = attempt.options;
        debug!(archive = %opts.path.display(), stage = ?attempt.stage, "opening archive");
        let mut handle = match self.archives.open(&opts.path, attempt.password()) {
            Ok(handle) => handle,
            Err(e) if e.is_soft() => return ExtractOutcome::SoftFailure(e.to_string()),
            Err(e) => return ExtractOutcome::Fatal(e),
        };

        let targets: Vec<String> = match &opts.file_names {
            Some(names) if !names.is_empty() => names.clone(),
            _ => handle
                .entries()
                .iter()
                .filter(|e| !e.is_dir && file_type(&e.name) == FileFlags::IMAGE)
                .map(|e| e.name.clone())
                .collect(),
        };

        let is_thumb = opts.decode_size == self.thumbnail_size;
        let mut from_disk = false;

        for name in &targets {
            if cancel.is_cancelled() {
                break;
            }
            if done.contains(name) {
                continue;
            }

            let mut image = None;
            if opts.load_image {
                let key = ThumbKey::new(&opts.path, name, opts.decode_size);
                if opts.try_cache && is_thumb {
                    image = self.cached_bitmap(&key);
                }
                if image.is_none() {
                    debug!(archive = %opts.path.display(), entry = %name, "extracting");
                    match handle.extract(name) {
                        Ok(bytes) if bytes.is_empty() => {
                            warn!(archive = %opts.path.display(), entry = %name, "entry extracted empty");
                        }
                        Ok(bytes) => {
                            from_disk = true;
                            image = self.decode_bytes(&bytes, opts.decode_size);
                            if is_thumb && let Some(img) = &image {
                                self.store_bitmap(&key, img);
                            }
                        }
                        Err(ArchiveError::EntryNotFound(entry)) => {
                            warn!(archive = %opts.path.display(), %entry, "entry not in archive");
                        }
                        Err(e) if e.is_soft() => {
                            return ExtractOutcome::SoftFailure(format!("{name}: {e}"));
                        }
                        Err(e) => return ExtractOutcome::Fatal(e),
                    }
                }
            }

            if let Some(callback) = &opts.on_entry {
                callback(&ObjectInfo::archive_entry(&opts.path, name, image));
            }
            done.insert(name.clone());
        }

        info.fill_source_paths(targets);

        if from_disk && let Some(password) = attempt.password() {
            self.credentials.set_mapped(&opts.path, password);
        }

        ExtractOutcome::Success
    }
}
