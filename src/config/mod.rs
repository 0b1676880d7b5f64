//! Configuration management for medivault.
//!
//! This module handles loading configuration from `~/.medivault/`.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{ApiConfig, ColorSetting, Config, GeneralConfig, SyncConfig};
