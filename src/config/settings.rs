//! Configuration settings for medivault.
//!
//! Settings are loaded from `~/.medivault/config.yaml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::MedivaultError;

/// Contents of `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Output and logging.
    pub general: GeneralConfig,
    /// Remote API settings.
    pub api: ApiConfig,
    /// Offline queue replay settings.
    pub sync: SyncConfig,
}

/// Output and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Format used when `--output` is not given.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    /// Whether to emit ANSI colors.
    #[serde(default = "default_color")]
    pub color: ColorSetting,
    /// Log filter used when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorSetting {
    /// Only when writing to a terminal.
    #[default]
    Auto,
    /// Even when piped.
    Always,
    /// Plain text only.
    Never,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the REST service, including the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Offline queue replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between drain attempts in `sync watch`.
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
    /// Consecutive transient stops on the same head before warning the user.
    #[serde(default = "default_transient_alert_threshold")]
    pub transient_alert_threshold: u32,
    /// Timeout for the connectivity probe in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_color() -> ColorSetting {
    ColorSetting::Auto
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_watch_interval() -> u64 {
    30
}

const fn default_transient_alert_threshold() -> u32 {
    5
}

const fn default_probe_timeout() -> u64 {
    5
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            watch_interval_secs: default_watch_interval(),
            transient_alert_threshold: default_transient_alert_threshold(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Config {
    /// Read `config.yaml` from a data root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(paths: &Paths) -> Result<Self, MedivaultError> {
        Self::load_from_path(&paths.config_file)
    }

    /// Read a config file. A missing file yields the defaults, and missing
    /// keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<Self, MedivaultError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(MedivaultError::Config(format!(
                    "Cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        serde_yaml::from_str(&contents)
            .map_err(|e| MedivaultError::Config(format!("Invalid {}: {e}", path.display())))
    }

    /// Write this configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to_path(&self, path: &Path) -> Result<(), MedivaultError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| MedivaultError::Config(format!("Cannot serialize config: {e}")))?;
        std::fs::write(path, contents)
            .map_err(|e| MedivaultError::Config(format!("Cannot write {}: {e}", path.display())))
    }
}
