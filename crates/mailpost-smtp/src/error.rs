//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Server returned an unexpected reply code.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (malformed reply).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation not valid in the current session state.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Address cannot be sent to this server. Always permanent.
    #[error("Addressing error: {0}")]
    Addressing(String),

    /// Message failed validation before anything was sent.
    #[error("Invalid message: {0}")]
    Validation(String),

    /// Authentication mechanism failure.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Message encoding failed.
    #[error("Message encoding failed: {0}")]
    Mime(#[from] mailpost_mime::Error),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns the server reply code, if the error carries one.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::SmtpError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx or addressing).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
            || matches!(self, Self::Addressing(_))
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns an equivalent error for replaying a cached failure.
    ///
    /// Reply errors and timeouts are reproduced exactly; the rest keep their
    /// message.
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::SmtpError { code, message } => Self::smtp_error(*code, message.clone()),
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::Tls(e) => Self::Tls(e.clone()),
            Self::Timeout(d) => Self::Timeout(*d),
            Self::InvalidState(m) => Self::InvalidState(m.clone()),
            other => Self::Protocol(other.to_string()),
        }
    }
}
