//! Error types for conferencing backend operations.

use std::fmt;

use meeting_auth::error::{ErrorKind as AuthErrorKind, HttpErrorKind};

/// Universal error type that abstracts provider-specific errors into common variants.
///
/// Adapters map their native failures onto these variants. Nothing above the
/// orchestration boundary ever sees them: the orchestration layer logs them and
/// turns them into negative results.
#[derive(Debug)]
pub enum Error {
    /// Required provider settings are missing. The adapter cannot talk to its
    /// provider until an administrator completes the configuration.
    NotConfigured(String),

    /// The caller asked for a capability this provider does not offer (e.g.
    /// recordings on a provider without recording support). Distinct from an
    /// empty result so callers can tell "nothing there" from "not possible here".
    Unsupported(String),

    /// Credentials were rejected or a token could not be obtained.
    Authentication(String),

    /// Network connectivity issues, DNS failures, or connection timeouts.
    /// These errors are typically transient.
    Network(String),

    /// Invalid session options or settings detected before any remote call.
    Configuration(String),

    /// The provider answered, but with a failure (non-success status or a
    /// `FAILED` return code).
    Provider(String),

    /// The remote meeting or recording does not exist.
    NotFound(String),

    /// A provider response could not be decoded.
    Serialization(String),

    /// Catch-all for errors that don't fit other categories.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn unsupported(feature: &str) -> Self {
        Error::Unsupported(format!("{feature} not supported by this backend"))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConfigured(msg) => write!(f, "Backend not configured: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Other(err) => write!(f, "Other error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<meeting_auth::Error> for Error {
    fn from(err: meeting_auth::Error) -> Self {
        match &err.error_kind {
            AuthErrorKind::Http(HttpErrorKind::BuilderFailed) => {
                Error::Configuration(err.to_string())
            }
            AuthErrorKind::Http(_) => Error::Network(err.to_string()),
            AuthErrorKind::OAuth(_) => Error::Authentication(err.to_string()),
            AuthErrorKind::Checksum(_) => Error::NotConfigured(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
