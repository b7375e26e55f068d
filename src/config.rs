//! Application configuration.
//!
//! Nothing is read implicitly: a TOML file is loaded only when passed with
//! `--config`. Every field has a default, so partial files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::convert::ConvertOptions;
use crate::model::range::DateRange;
use crate::parser::mbox::MAX_MESSAGE_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// CSV export settings.
    pub export: ExportConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// CSV export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Print a progress line every this many messages (0 disables).
    pub progress_interval: u64,
    /// Write a UTF-8 BOM at the start of the CSV (helps Excel).
    pub utf8_bom: bool,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum message size in bytes (default: 268435456 = 256 MB).
    ///
    /// Bytes past the limit are dropped before MIME parsing, so a small value
    /// can shorten or empty the Body column of large messages.
    pub max_message_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            utf8_bom: false,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl Config {
    /// Conversion options for `range` under this configuration.
    pub fn convert_options(&self, range: DateRange) -> ConvertOptions {
        ConvertOptions {
            range,
            progress_interval: self.export.progress_interval,
            utf8_bom: self.export.utf8_bom,
            max_message_size: self.performance.max_message_size,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from an explicit path, or return the defaults.
///
/// Falls back to the defaults (with a warning) if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}
