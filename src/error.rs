//! Error types for medivault.

use thiserror::Error;

/// Errors surfaced by medivault operations.
///
/// Routine queue conditions (duplicate ids, empty queue) are never errors.
/// Anything that would let in-memory and persisted state diverge is.
#[derive(Debug, Error)]
pub enum MedivaultError {
    /// Configuration could not be read, parsed, or resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite failure.
    #[error("Database error: {0}")]
    Database(String),

    /// The durable store rejected a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode failure.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// HTTP call failed outside of a drain cycle.
    #[error("HTTP error: {0}")]
    Http(String),

    /// No session token, or the server rejected it.
    #[error("Not logged in: {0}")]
    AuthRequired(String),

    /// Requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MedivaultError {
    /// Exit code for the CLI.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) | Self::Config(_) => 2,
            Self::AuthRequired(_) => 3,
            Self::NotFound(_) => 4,
            _ => 1,
        }
    }
}

impl From<rusqlite::Error> for MedivaultError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
