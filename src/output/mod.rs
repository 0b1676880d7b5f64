//! Output formatting for medivault.
//!
//! Every command renders either colored text or JSON.

mod json;
mod pretty;

use crate::api::SessionUser;
use crate::cli::args::OutputFormat;
use crate::error::MedivaultError;
use crate::features::offline::{DrainReport, FailureRecord, QueuedAction};

pub use json::*;
pub use pretty::*;

/// Format pending actions based on output format
///
/// `total` is the full queue size; `actions` may be a prefix of it.
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_queue(
    actions: &[QueuedAction],
    total: usize,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    match format {
        OutputFormat::Pretty => Ok(format_queue_pretty(actions, total)),
        OutputFormat::Json => format_queue_json(actions, total),
    }
}

/// Format queue status based on output format
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_status(
    size: usize,
    head: Option<&QueuedAction>,
    failures: i64,
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(size, head, failures)),
        OutputFormat::Json => format_status_json(size, head, failures),
    }
}

/// Format a single action based on output format
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_action(action: &QueuedAction, format: OutputFormat) -> Result<String, MedivaultError> {
    match format {
        OutputFormat::Pretty => Ok(format_action_pretty(action)),
        OutputFormat::Json => to_json(action),
    }
}

/// Format a drain report based on output format
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_drain(report: &DrainReport, format: OutputFormat) -> Result<String, MedivaultError> {
    match format {
        OutputFormat::Pretty => Ok(format_drain_pretty(report)),
        OutputFormat::Json => format_drain_json(report),
    }
}

/// Format the failure log based on output format
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_failures(
    records: &[FailureRecord],
    format: OutputFormat,
) -> Result<String, MedivaultError> {
    match format {
        OutputFormat::Pretty => Ok(format_failures_pretty(records)),
        OutputFormat::Json => format_failures_json(records),
    }
}

/// Format the signed-in user based on output format
///
/// # Errors
///
/// Returns `MedivaultError::Parse` if JSON serialization fails.
pub fn format_user(user: Option<&SessionUser>, format: OutputFormat) -> Result<String, MedivaultError> {
    match format {
        OutputFormat::Pretty => Ok(format_user_pretty(user)),
        OutputFormat::Json => format_user_json(user),
    }
}
