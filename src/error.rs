// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for Courier
//!
//! Configuration problems, unclassified transport failures and lifecycle
//! misuse all surface as [`Error`]. Transport failures that the session
//! knows how to recover from never reach this type; they are turned into
//! ordinary responses instead.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Courier
#[derive(Error, Debug)]
pub enum Error {
    /// Request or session is misconfigured (no URL, unsupported scheme, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Transport failure that could not be turned into a response
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The transport reported an error status while opening the
    /// connection, so there is no error body to read
    #[error("Server returned HTTP status {0} before a connection was opened")]
    StatusWithoutConnection(u16),

    /// Local I/O error (reading a body source, a file parameter, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// TLS configuration failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request/response cycle was cancelled
    #[error("Request aborted")]
    Aborted,

    /// A worker is already running for this service
    #[error("Cannot send while request/response in process")]
    InProgress,

    /// A lifecycle event was fired out of sequence
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Cookie handling error
    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Form resolution or submission error
    #[error("Form submission failed: {reason}")]
    Form {
        reason: String,
        action: Option<String>,
    },

    /// Response decoder rejected the body
    #[error("Decode error: {0}")]
    Decode(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a form error without an action
    pub fn form(reason: impl Into<String>) -> Self {
        Error::Form {
            reason: reason.into(),
            action: None,
        }
    }

    /// Create a form error naming the offending action URL
    pub fn form_with_action(reason: impl Into<String>, action: impl Into<String>) -> Self {
        Error::Form {
            reason: reason.into(),
            action: Some(action.into()),
        }
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Error::Decode(msg.into())
    }

    /// Create an illegal state error
    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        Error::IllegalState(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this error represents a cancellation
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            Error::Aborted | Error::Transport(TransportError::Interrupted)
        )
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Url(_))
    }

    /// Check if retrying the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transport(TransportError::Io(e)) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            Error::Transport(TransportError::Retry(_)) | Error::InProgress => true,
            _ => false,
        }
    }

    /// Get the form action URL if available
    pub fn action(&self) -> Option<&str> {
        match self {
            Error::Form {
                action: Some(a), ..
            } => Some(a),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Prefix the error message with an operation description
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            Error::Other(format!("{}: {}", msg, err))
        })
    }
}
