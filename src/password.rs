//! Password resolution for archives.
//!
//! Stages run in order until one succeeds:
//!
//! | Stage | Password | Runs when |
//! |---|---|---|
//! | [`Stage::Known`] | caller's password, then the one stored for this path | either exists |
//! | [`Stage::Empty`] | none | always |
//! | [`Stage::Fallback`] | each fallback, oldest first | always |
//! | [`Stage::Prompt`] | asked from the [`PasswordPrompt`] until it succeeds or the user gives up | image content requested for the archive itself |
//!
//! Cancellation is checked before every attempt. One `done` set is shared by
//! all attempts so an entry processed by an earlier attempt is never redone.
//!
//! When every stage fails the result carries [`FileFlags::ERROR`](crate::types::FileFlags::ERROR) and
//! [`EXTRACTION_FAILED`]; only fatal I/O reaches the caller as an error.

use crate::archive::ArchiveError;
use crate::archive::extract::{Attempt, ExtractOutcome};
use crate::load::Loader;
use crate::types::{CancelToken, LoadOptions, ObjectInfo};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

pub const EXTRACTION_FAILED: &str = "Extraction failed. Bad password or not supported image formats.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Known,
    Empty,
    Fallback,
    Prompt,
}

/// What the user typed into the password prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptReply {
    pub password: String,
    /// Also add the password to the fallback list on success.
    pub remember: bool,
}

impl PromptReply {
    pub fn new(password: impl Into<String>, remember: bool) -> Self {
        Self {
            password: password.into(),
            remember,
        }
    }
}

/// Interactive password source, supplied by the host.
pub trait PasswordPrompt: Send + Sync {
    /// Ask for the password of `archive`. `None` means the user cancelled.
    fn ask(&self, archive: &Path) -> Option<PromptReply>;
}

/// The prompt only makes sense when the user is opening the archive itself,
/// not when a single thumbnail is being loaded in the background.
fn prompt_allowed(options: &LoadOptions) -> bool {
    let unfiltered = options.file_names.as_ref().is_none_or(|n| n.is_empty());
    options.load_image && (unfiltered || options.decode_size.is_default())
}

impl Loader {
    /// Run one attempt and fold its outcome into "stop here?".
    fn try_stage(
        &self,
        attempt: Attempt<'_>,
        info: &mut ObjectInfo,
        done: &mut HashSet<String>,
        cancel: &CancelToken,
    ) -> Result<bool, ArchiveError> {
        match self.extract_images(&attempt, info, done, cancel) {
            ExtractOutcome::Success => {
                debug!(archive = %attempt.options.path.display(), stage = ?attempt.stage, "archive opened");
                Ok(true)
            }
            ExtractOutcome::SoftFailure(reason) => {
                debug!(archive = %attempt.options.path.display(), stage = ?attempt.stage, %reason, "attempt failed");
                Ok(false)
            }
            ExtractOutcome::Fatal(e) => Err(e),
        }
    }

    /// Resolve an archive into `info`, trying each password stage in turn.
    ///
    /// Returns early without marking an error when cancelled; the caller
    /// decides what a cancelled load reports.
    pub(crate) fn resolve_archive(
        &self,
        options: &LoadOptions,
        info: &mut ObjectInfo,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        let path = options.path.as_path();
        let mut done = HashSet::new();

        let mut known: Vec<String> = Vec::new();
        if let Some(pw) = options.password.as_deref().filter(|p| !p.is_empty()) {
            known.push(pw.to_string());
        }
        if let Some(pw) = self.credentials.mapped(path).filter(|p| !p.is_empty())
            && !known.contains(&pw)
        {
            known.push(pw);
        }

        for password in &known {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let attempt = Attempt {
                options,
                password: Some(password.as_str()),
                stage: Stage::Known,
            };
            if self.try_stage(attempt, info, &mut done, cancel)? {
                return Ok(());
            }
        }

        if cancel.is_cancelled() {
            return Ok(());
        }
        let attempt = Attempt {
            options,
            password: None,
            stage: Stage::Empty,
        };
        if self.try_stage(attempt, info, &mut done, cancel)? {
            return Ok(());
        }

        for password in self.credentials.fallbacks() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let attempt = Attempt {
                options,
                password: Some(password.as_str()),
                stage: Stage::Fallback,
            };
            if self.try_stage(attempt, info, &mut done, cancel)? {
                return Ok(());
            }
        }

        if prompt_allowed(options)
            && let Some(prompt) = &self.prompt
        {
            loop {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                let Some(reply) = prompt.ask(path) else {
                    break;
                };
                if reply.password.is_empty() {
                    break;
                }
                let attempt = Attempt {
                    options,
                    password: Some(reply.password.as_str()),
                    stage: Stage::Prompt,
                };
                if self.try_stage(attempt, info, &mut done, cancel)? {
                    self.credentials.set_mapped(path, &reply.password);
                    if reply.remember {
                        self.credentials.add_fallback(&reply.password);
                    }
                    info!(archive = %path.display(), remembered = reply.remember, "password accepted");
                    return Ok(());
                }
                info!(archive = %path.display(), "wrong password");
            }
        }

        if !cancel.is_cancelled() {
            warn!(archive = %path.display(), "{EXTRACTION_FAILED}");
            info.mark_error(EXTRACTION_FAILED);
        }
        Ok(())
    }
}
