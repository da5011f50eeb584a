//! Internal error types for chat operations.
//!
//! Mapped to [`AvatarError`] at the port boundary.

use std::time::Duration;

use avchat_core::{AvatarError, Backend};
use thiserror::Error;

/// Result type alias for chat operations.
pub type ChatResult<T> = Result<T, ChatClientError>;

/// Longest response body excerpt kept in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors talking to Azure OpenAI or Azure AI Search.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// The key was rejected.
    #[error("{service} rejected the credentials (status {status})")]
    Unauthorized { service: Backend, status: u16 },

    /// Too many requests.
    #[error("{service} rate limit exceeded")]
    RateLimited {
        service: Backend,
        retry_after: Option<Duration>,
    },

    /// Request failed with an HTTP error status.
    #[error("{service} request failed with status {status}: {excerpt}")]
    ApiRequestFailed {
        service: Backend,
        status: u16,
        excerpt: String,
    },

    /// The service answered with something unexpected.
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: Backend, message: String },

    /// Network or HTTP client error.
    #[error("Network error talking to {service}: {source}")]
    Network {
        service: Backend,
        #[source]
        source: reqwest::Error,
    },
}

impl ChatClientError {
    pub fn api_failure(service: Backend, status: u16, body: &str) -> Self {
        let body = body.trim();
        let mut excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        if body.chars().count() > BODY_EXCERPT_CHARS {
            excerpt.push('…');
        }
        Self::ApiRequestFailed {
            service,
            status,
            excerpt,
        }
    }

    pub const fn network(service: Backend, source: reqwest::Error) -> Self {
        Self::Network { service, source }
    }

    pub fn invalid_response(service: Backend, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    pub const fn service(&self) -> Backend {
        match self {
            Self::Unauthorized { service, .. }
            | Self::RateLimited { service, .. }
            | Self::ApiRequestFailed { service, .. }
            | Self::InvalidResponse { service, .. }
            | Self::Network { service, .. } => *service,
        }
    }
}

impl From<ChatClientError> for AvatarError {
    fn from(err: ChatClientError) -> Self {
        let service = err.service();
        let message = err.to_string();
        match err {
            ChatClientError::Unauthorized { .. } => Self::auth(service, message),
            ChatClientError::RateLimited { retry_after, .. } => {
                Self::rate_limited(service, retry_after, message)
            }
            ChatClientError::Network { ref source, .. }
                if source.is_connect() || source.is_timeout() =>
            {
                Self::unavailable(service, message)
            }
            ChatClientError::Network { .. }
            | ChatClientError::ApiRequestFailed { .. }
            | ChatClientError::InvalidResponse { .. } => Self::service(service, message),
        }
    }
}
