//! Internal error types for speech operations.
//!
//! These errors are internal to `avchat-speech` and are mapped to
//! [`AvatarError`] at the port boundary.

use std::time::Duration;

use avchat_core::{AvatarError, Backend};
use thiserror::Error;

/// Result type alias for speech operations.
pub type SpeechResult<T> = Result<T, SpeechClientError>;

/// Errors related to the Azure Speech service.
#[derive(Debug, Error)]
pub enum SpeechClientError {
    /// The key was rejected.
    #[error("Speech service rejected the credentials (status {status})")]
    Unauthorized {
        /// HTTP status code
        status: u16,
    },

    /// Too many requests.
    #[error("Speech service throttled the request")]
    Throttled {
        /// Server-suggested wait, if sent
        retry_after: Option<Duration>,
    },

    /// Request failed with an HTTP error status.
    #[error("Speech request failed with status {status}: {url}")]
    ApiRequestFailed {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// The service answered with something unexpected.
    #[error("Invalid response from speech service: {message}")]
    InvalidResponse {
        /// Description of what was invalid
        message: String,
    },

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// `speak` was called on a backend that is not connected.
    #[error("Avatar backend is not connected")]
    NotConnected,

    /// The audio sink failed.
    #[error("Audio output failed: {0}")]
    Output(String),
}

impl From<SpeechClientError> for AvatarError {
    fn from(err: SpeechClientError) -> Self {
        let message = err.to_string();
        match err {
            SpeechClientError::Unauthorized { .. } => Self::auth(Backend::Speech, message),
            SpeechClientError::Throttled { retry_after } => {
                Self::rate_limited(Backend::Speech, retry_after, message)
            }
            // A wrong region usually shows up as 404 or a 5xx from the edge
            SpeechClientError::ApiRequestFailed { status, .. }
                if status == 404 || status >= 500 =>
            {
                Self::unavailable(Backend::Speech, message)
            }
            SpeechClientError::Network(_) => Self::unavailable(Backend::Speech, message),
            SpeechClientError::NotConnected => Self::invalid_state(message),
            SpeechClientError::ApiRequestFailed { .. }
            | SpeechClientError::InvalidResponse { .. }
            | SpeechClientError::Output(_) => Self::service(Backend::Speech, message),
        }
    }
}
