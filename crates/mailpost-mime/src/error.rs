//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error while writing a message or reading an attachment.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Address missing or unusable for the message.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Converting the HTML body to plain text failed.
    #[error("Failed to derive text body from HTML: {0}")]
    Sanitize(String),
}
