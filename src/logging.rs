//! Diagnostic logging setup.
//!
//! Events go to stderr so they never mix with command output on stdout.

use tracing_subscriber::EnvFilter;

use crate::config::{ColorSetting, GeneralConfig};

/// Filter directive for a `-v` count, or `None` to use the configured level.
#[must_use]
pub const fn verbosity_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("medivault=info"),
        2 => Some("medivault=debug"),
        _ => Some("medivault=trace"),
    }
}

/// Build the filter: `RUST_LOG` wins, then `-v`, then `general.log_level`.
#[must_use]
pub fn filter(verbose: u8, general: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = verbosity_directive(verbose).unwrap_or(general.log_level.as_str());
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"))
    })
}

/// Install the global subscriber. Does nothing if one is already installed.
pub fn init(verbose: u8, general: &GeneralConfig) {
    let ansi = match general.color {
        ColorSetting::Always => true,
        ColorSetting::Never => false,
        ColorSetting::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, general))
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
}
