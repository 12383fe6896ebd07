//! Error types for Terminalplex.
//!
//! Library crates use [`TerminalplexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Terminalplex operations.
#[derive(Debug, thiserror::Error)]
pub enum TerminalplexError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during search or page fetch.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or response decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Web-search provider error.
    #[error("search error: {0}")]
    Search(String),

    /// Chat-completion service error (reformulation or answer call).
    ///
    /// `status` is the HTTP status when the service answered at all; `None`
    /// means the request never got a response (transport failure) or the
    /// response body was unusable.
    #[error("completion error: {message}")]
    Completion {
        status: Option<u16>,
        message: String,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TerminalplexError>;

impl TerminalplexError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Completion failure without an HTTP status (transport or decoding).
    pub fn completion(msg: impl Into<String>) -> Self {
        Self::Completion {
            status: None,
            message: msg.into(),
        }
    }

    /// Completion failure carrying the service's HTTP status.
    pub fn completion_status(status: u16, msg: impl Into<String>) -> Self {
        Self::Completion {
            status: Some(status),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same turn has a reasonable chance of succeeding.
    ///
    /// True for transport failures and for HTTP 408, 429 and 5xx answers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Completion { status: None, .. } => true,
            Self::Completion {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TerminalplexError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = TerminalplexError::completion_status(401, "HTTP 401 Unauthorized");
        assert_eq!(err.to_string(), "completion error: HTTP 401 Unauthorized");
    }

    #[test]
    fn retryable_classification() {
        assert!(TerminalplexError::completion_status(429, "slow down").is_retryable());
        assert!(TerminalplexError::completion_status(503, "unavailable").is_retryable());
        assert!(TerminalplexError::completion("connection reset").is_retryable());
        assert!(!TerminalplexError::completion_status(401, "bad key").is_retryable());
        assert!(!TerminalplexError::validation("empty query").is_retryable());
    }
}
