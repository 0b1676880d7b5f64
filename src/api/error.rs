//! Remote call failures and their delivery classification.

use thiserror::Error;

/// How a failed delivery should be treated by the drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected to succeed on retry; keep the entry at the head.
    Transient,
    /// Will not succeed without changing the request; drop and report.
    Permanent,
    /// The session is missing or rejected; keep the entry and stop until login.
    AuthRequired,
}

/// A remote call that did not complete successfully.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, reset, or any other transport problem.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// 2xx response whose envelope reported `success: false`.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The queued payload cannot be turned into a request.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// 2xx response with a body that could not be decoded.
    #[error("unreadable response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify this failure for the drain loop.
    ///
    /// [`ApiError::Decode`] is classified as transient here, but the drain
    /// loop checks [`ApiError::took_effect`] first and never reaches this.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Decode(_) => FailureClass::Transient,
            Self::Status { status, .. } => classify_status(*status),
            Self::Rejected(_) | Self::InvalidPayload(_) => FailureClass::Permanent,
        }
    }

    /// Whether the server acknowledged the mutation despite the error.
    #[must_use]
    pub const fn took_effect(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    pub(crate) fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Map an HTTP status code to a failure class.
#[must_use]
pub const fn classify_status(status: u16) -> FailureClass {
    match status {
        401 | 403 => FailureClass::AuthRequired,
        408 | 429 => FailureClass::Transient,
        400..=499 => FailureClass::Permanent,
        _ => FailureClass::Transient,
    }
}
