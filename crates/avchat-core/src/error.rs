//! Error types surfaced by the session controller and its ports.
//!
//! Adapters keep their own internal error enums and map them into
//! [`AvatarError`] at the port boundary, so callers only ever see the
//! categories below.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::ConfigError;

/// The external service an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Speech,
    Chat,
    Search,
}

impl Backend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Chat => "chat",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error category, used by presentation layers and exit code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Auth,
    InvalidState,
    InvalidInput,
    RateLimit,
    Service,
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "configuration",
            Self::Auth => "authentication",
            Self::InvalidState => "invalid state",
            Self::InvalidInput => "invalid input",
            Self::RateLimit => "rate limit",
            Self::Service => "service",
            Self::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

/// Errors returned by controller operations.
#[derive(Debug, Error)]
pub enum AvatarError {
    /// Required settings are missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A service rejected the supplied credentials.
    #[error("{service} service rejected the credentials: {message}")]
    Auth { service: Backend, message: String },

    /// The operation is not valid in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The user message was empty after sanitization.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The service throttled the request.
    #[error("{service} service rate limited the request: {message}")]
    RateLimited {
        service: Backend,
        retry_after: Option<Duration>,
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} service error: {message}")]
    Service { service: Backend, message: String },

    /// The service could not be reached.
    #[error("{service} service unavailable: {message}")]
    Unavailable { service: Backend, message: String },
}

impl AvatarError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn auth(service: Backend, message: impl Into<String>) -> Self {
        Self::Auth {
            service,
            message: message.into(),
        }
    }

    pub fn service(service: Backend, message: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: message.into(),
        }
    }

    pub fn unavailable(service: Backend, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rate_limited(
        service: Backend,
        retry_after: Option<Duration>,
        message: impl Into<String>,
    ) -> Self {
        Self::RateLimited {
            service,
            retry_after,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Service { .. } => ErrorKind::Service,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }

    /// Only throttling is retried automatically; everything else surfaces.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The service this error came from, if any.
    pub const fn backend(&self) -> Option<Backend> {
        match self {
            Self::Auth { service, .. }
            | Self::RateLimited { service, .. }
            | Self::Service { service, .. }
            | Self::Unavailable { service, .. } => Some(*service),
            Self::Config(_) | Self::InvalidState(_) | Self::InvalidInput(_) => None,
        }
    }
}
