//! Error types for plexkit operations.
//!
//! Errors are categorized so callers can tell transient transport problems
//! from rejected requests and malformed responses.

use std::fmt;

/// Result type alias for plexkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Longest response body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Categories of plexkit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection-level failure (transient, retryable).
    Network,
    /// The call or the overall operation ran out of time.
    Timeout,
    /// Server, user, or endpoint not found.
    NotFound,
    /// Token rejected.
    Auth,
    /// Response body could not be parsed.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Timeout => "Request timed out",
            Self::NotFound => "Resource not found",
            Self::Auth => "Authentication failed",
            Self::Format => "Unexpected response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the server is reachable and try again",
            Self::Timeout => "The server is slow or unreachable; try again later",
            Self::NotFound => "Verify the machine identifier and user in the config",
            Self::Auth => "Check the configured token for this server",
            Self::Format => "The server returned an unexpected payload",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to plex.tv or a media server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or unexpected HTTP status.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// A call timed out or the operation deadline was exhausted.
    #[error("timed out: {0}")]
    Timeout(String),

    /// HTTP 401/403.
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// HTTP 404 from a read endpoint, or a lookup that found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A sharing mutation answered with an error that does not prove failure.
    ///
    /// plex.tv returns 404 from shared-server updates that were in fact
    /// applied, so callers must re-read state before treating this as failed.
    #[error("sharing request rejected ({status}): {message}")]
    SharingRejected {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, url: &str, body: &str) -> Self {
        let message = format!("HTTP {status} from {url}: {}", excerpt(body));
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            404 => Self::NotFound(message),
            _ => Self::Http {
                message,
                status: Some(status),
            },
        }
    }

    /// Reclassify the error of a sharing mutation.
    ///
    /// Only a 404 becomes [`Error::SharingRejected`]; everything else is kept.
    #[must_use]
    pub fn into_sharing_failure(self) -> Self {
        match self {
            Self::NotFound(message) => Self::SharingRejected {
                status: 404,
                message,
            },
            other => other,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status: None, .. } => ErrorCategory::Network,
            Error::Http {
                status: Some(code), ..
            } if *code >= 500 => ErrorCategory::Network,
            Error::Http { .. } => ErrorCategory::Other,
            Error::Timeout(_) => ErrorCategory::Timeout,
            Error::Unauthorized { .. } => ErrorCategory::Auth,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::SharingRejected { .. } => ErrorCategory::NotFound,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }

    /// Whether a sharing mutation may have succeeded despite this error.
    #[must_use]
    pub fn is_ambiguous_sharing_failure(&self) -> bool {
        matches!(self, Self::SharingRejected { status: 404, .. })
    }

    /// HTTP status code carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => *status,
            Error::Unauthorized { status, .. } | Error::SharingRejected { status, .. } => {
                Some(*status)
            }
            Error::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

/// Shorten a response body for inclusion in an error message.
fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_BODY_EXCERPT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_BODY_EXCERPT).collect();
        format!("{cut}...")
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            ureq::Error::Timeout(t) => Self::Timeout(format!("{t:?}")),
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Self::InvalidResponse(format!("XML: {err}"))
    }
}
