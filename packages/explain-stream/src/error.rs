//! Error types for stream consumption.

use thiserror::Error;

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Failures a stream consumer can observe.
///
/// Malformed terminal JSON is deliberately absent: it degrades to raw text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The transport produced a response without a body.
    #[error("No response body")]
    NoResponseBody,

    /// A read failed part-way through the stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The consumer aborted the stream itself.
    #[error("Stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// Cancellation is never shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}
