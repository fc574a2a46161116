//! Error types for the overlay.

use explain_stream::StreamError;
use thiserror::Error;

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Shown for every failure that has no more specific message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error loading analysis. Please try again.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverlayError {
    /// No paired credential is stored.
    #[error("Not connected")]
    NotConnected,

    /// The server rejected the stored credential.
    #[error("Session expired")]
    SessionExpired,

    /// Any other non-success status.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("No response body")]
    NoResponseBody,

    #[error("Transport error: {0}")]
    Transport(String),

    /// Aborted by the overlay itself; never shown.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    /// A trigger could not reach the page.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl OverlayError {
    pub fn is_silent(&self) -> bool {
        matches!(self, OverlayError::Cancelled)
    }

    /// Text for the panel's error box.
    pub fn user_message(&self) -> &'static str {
        match self {
            OverlayError::NotConnected => "Not connected",
            OverlayError::SessionExpired => "Session expired",
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl From<StreamError> for OverlayError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::NoResponseBody => OverlayError::NoResponseBody,
            StreamError::Transport(message) => OverlayError::Transport(message),
            StreamError::Cancelled => OverlayError::Cancelled,
        }
    }
}

impl From<reqwest::Error> for OverlayError {
    fn from(error: reqwest::Error) -> Self {
        OverlayError::Transport(error.to_string())
    }
}
