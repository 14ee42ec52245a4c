//! # Settings Loader
//!
//! Centralized loading of `settings.json` for the dashboard server and the
//! command-line tools: reference period for trailing windows, the pasted-text
//! limit, currency symbol, default view and the document database location.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/settings.json")?;
//!
//! // Try an optional path, then ./settings.json
//! let path = Some(PathBuf::from("config/settings.json"));
//! let settings = settings_loader::load_settings_with_fallback(path.as_ref())?.unwrap_or_default();
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use models::{ReportingPeriod, Settings};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    if settings.max_input_chars == 0 {
        anyhow::bail!("max_input_chars must be positive in {}", path.display());
    }
    Ok(settings)
}

/// Loads settings from the default location (settings.json in the current directory)
pub fn load_default_settings() -> Result<Settings> {
    load_settings(DEFAULT_SETTINGS_FILE)
}

/// Tries the provided path first, then the default location. Returns None only
/// if no readable settings file is found anywhere.
pub fn load_settings_with_fallback(path: Option<&PathBuf>) -> Result<Option<Settings>> {
    if let Some(settings_path) = path {
        match load_settings(settings_path) {
            Ok(settings) => return Ok(Some(settings)),
            Err(e) => {
                tracing::warn!("{:#}; falling back to {}", e, DEFAULT_SETTINGS_FILE);
            }
        }
    }

    match load_default_settings() {
        Ok(settings) => Ok(Some(settings)),
        Err(_) => Ok(None),
    }
}

/// The month trailing windows end at: the configured reference period, or the
/// month containing `today`.
pub fn reference_period(settings: &Settings, today: NaiveDate) -> ReportingPeriod {
    settings
        .reference_period
        .unwrap_or_else(|| ReportingPeriod::from_date(today))
}
