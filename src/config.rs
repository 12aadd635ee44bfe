//! Viewer configuration module.
//!
//! Handles loading, validating, and merging the `config.toml` file found in
//! the data directory. Stock defaults are the base layer; the file overrides
//! any subset of them.
//!
//! ## Config File Location
//!
//! ```text
//! <data-dir>/
//! ├── config.toml              # Optional, overrides stock defaults
//! ├── thumb_database.sqlite    # Thumbnail cache (created on first use)
//! └── credentials.sqlite       # Archive passwords (created on first use)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! thumbnail_size = [300, 300]   # Canonical size; only this size is cached
//!
//! [database]
//! thumbnails = "thumb_database.sqlite"
//! credentials = "credentials.sqlite"
//!
//! [processing]
//! max_decoders = 4              # Concurrent decodes (omit for auto = CPU cores)
//! cache_workers = 2             # Warm-up workers (omit for auto = cores / 2, 1..=6)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::DecodeSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Viewer configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Thumbnail size as `[width, height]`. Requests at any other size bypass
    /// the cache.
    pub thumbnail_size: [u32; 2],
    /// Store file names, relative to the data directory.
    pub database: DatabaseConfig,
    pub processing: ProcessingConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: [300, 300],
            database: DatabaseConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size[0] == 0 || self.thumbnail_size[1] == 0 {
            return Err(ConfigError::Validation(
                "thumbnail_size values must be non-zero".into(),
            ));
        }
        if self.database.thumbnails.trim().is_empty() || self.database.credentials.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database file names must not be empty".into(),
            ));
        }
        if self.database.thumbnails == self.database.credentials {
            return Err(ConfigError::Validation(
                "database.thumbnails and database.credentials must differ".into(),
            ));
        }
        if self.processing.max_decoders == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_decoders must be at least 1".into(),
            ));
        }
        if self.processing.cache_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.cache_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn thumbnail_size(&self) -> DecodeSize {
        DecodeSize::new(self.thumbnail_size[0], self.thumbnail_size[1])
    }

    pub fn thumbnails_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database.thumbnails)
    }

    pub fn credentials_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database.credentials)
    }
}

/// SQLite file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub thumbnails: String,
    pub credentials: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            thumbnails: "thumb_database.sqlite".to_string(),
            credentials: "credentials.sqlite".to_string(),
        }
    }
}

/// Parallelism settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of simultaneous decodes.
    /// When absent, defaults to the number of CPU cores.
    pub max_decoders: Option<usize>,
    /// Worker count for cache warm-up.
    /// When absent, half the CPU cores, clamped to 1..=6.
    pub cache_workers: Option<usize>,
}

fn cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve the decode throttle capacity.
///
/// - `None` → all available cores
/// - `Some(n)` → `n`, clamped to `1..=cores`
pub fn effective_decoders(config: &ProcessingConfig) -> usize {
    config.max_decoders.unwrap_or_else(cores).clamp(1, cores())
}

/// Resolve the warm-up worker count. An explicit value is still capped at 6.
pub fn effective_cache_workers(config: &ProcessingConfig) -> usize {
    match config.cache_workers {
        Some(n) => n.clamp(1, crate::warm::MAX_WORKERS),
        None => crate::warm::worker_count(cores()),
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ViewerConfig::default())?)
}

/// Deep-merge two TOML values. Tables merge key by key; anything else in
/// `overlay` replaces `base`.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `config.toml` from `dir` as an untyped value, if present.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ViewerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ViewerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Stock defaults overlaid with `<dir>/config.toml`.
pub fn load_config(dir: &Path) -> Result<ViewerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Commented config file printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# zipview configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the data directory (--data-dir).
# Unknown keys will cause an error.

# Canonical thumbnail size as [width, height].
# Only decodes at exactly this size are written to and read from the cache.
thumbnail_size = [300, 300]

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[database]
# SQLite files, relative to the data directory.
thumbnails = "thumb_database.sqlite"
credentials = "credentials.sqlite"

# ---------------------------------------------------------------------------
# Parallelism
# ---------------------------------------------------------------------------
[processing]
# Maximum simultaneous image decodes. Omit for one per CPU core.
# max_decoders = 4

# Workers used by `warm`. Omit for half the CPU cores (1 to 6).
# cache_workers = 2
"##
}
