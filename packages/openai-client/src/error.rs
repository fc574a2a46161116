//! Error types for the chat completions client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Missing API key or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed or timed out before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body broke off part-way through a stream
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// Unexpected response shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// 429 and 5xx responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            OpenAIError::Network(_) | OpenAIError::Stream(_) => true,
            OpenAIError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
