//! Error taxonomy for remote access operations.
//!
//! Backends classify every failure into an [`ErrorKind`] so the reconciler
//! can branch on a typed outcome instead of inspecting error text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of error detail carried into a result record.
pub const MAX_DETAIL_LEN: usize = 200;

/// Classification of a failed remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Timeout or connection failure. Surfaced, never retried here.
    TransientNetwork,
    /// Known false-negative response from a mutation endpoint.
    AmbiguousRemoteError,
    /// None of the requested resources exist on the server.
    InvalidResourceSet,
    /// The user's remote state forbids the requested change.
    IllegalStateTransition,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind may have taken effect anyway.
    pub fn needs_verification(&self) -> bool {
        matches!(self, Self::AmbiguousRemoteError)
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "Network failure or timeout",
            Self::AmbiguousRemoteError => "Ambiguous remote error",
            Self::InvalidResourceSet => "No requested library exists on the server",
            Self::IllegalStateTransition => "User state does not allow this change",
            Self::Unknown => "Unexpected remote error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A failed call against an [`AccessBackend`](crate::AccessBackend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct InvokeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl InvokeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientNetwork, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AmbiguousRemoteError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Message truncated for inclusion in an output record.
    pub fn detail(&self) -> String {
        truncate_detail(&self.message)
    }
}

/// Truncate error text to [`MAX_DETAIL_LEN`] characters, marking the cut.
pub fn truncate_detail(message: &str) -> String {
    if message.chars().count() <= MAX_DETAIL_LEN {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(MAX_DETAIL_LEN).collect();
    cut.push_str("...");
    cut
}
