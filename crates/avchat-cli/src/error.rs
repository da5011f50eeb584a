//! CLI-specific error types and mappings.
//!
//! Maps [`AvatarError`] categories to exit codes and user-facing messages.

use avchat_core::{AvatarError, ErrorKind};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or input problem.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Settings missing or malformed.
    #[error("{0}")]
    Config(String),

    /// Credentials rejected by a service.
    #[error("{0}")]
    Auth(String),

    /// A service could not be reached.
    #[error("{0}")]
    Unavailable(String),

    /// One or more setup checks failed.
    #[error("{0} check(s) failed")]
    ChecksFailed(usize),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,    // EX_USAGE
            Self::Config(_) => 78,      // EX_CONFIG
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Auth(_) => 77,        // EX_NOPERM
            Self::ChecksFailed(_) | Self::Other(_) => 1,
        }
    }
}

impl CliError {
    fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Config => Self::Config(message),
            ErrorKind::Auth => Self::Auth(message),
            ErrorKind::Unavailable => Self::Unavailable(message),
            ErrorKind::InvalidInput => Self::Arguments(message),
            ErrorKind::InvalidState | ErrorKind::RateLimit | ErrorKind::Service => {
                Self::Other(message)
            }
        }
    }
}

impl From<AvatarError> for CliError {
    fn from(err: AvatarError) -> Self {
        Self::from_kind(err.kind(), err.to_string())
    }
}

/// Exit code for an error bubbling out of `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    err.downcast_ref::<AvatarError>()
        .map_or(1, |e| CliError::from_kind(e.kind(), String::new()).exit_code())
}

#[cfg(test)]
mod tests {
    use avchat_core::{Backend, ConfigError, FieldIssue, SettingsField};

    use super::*;

    #[test]
    fn test_exit_codes() {
        let config = AvatarError::Config(ConfigError {
            issues: vec![FieldIssue::Missing(SettingsField::SpeechKey)],
        });
        assert_eq!(CliError::from(config).exit_code(), 78);
        assert_eq!(
            CliError::from(AvatarError::auth(Backend::Chat, "401")).exit_code(),
            77
        );
        assert_eq!(
            CliError::from(AvatarError::unavailable(Backend::Speech, "dns")).exit_code(),
            69
        );
        assert_eq!(
            CliError::from(AvatarError::service(Backend::Chat, "500")).exit_code(),
            1
        );
    }

    #[test]
    fn test_exit_code_through_anyhow() {
        let err = anyhow::Error::new(AvatarError::auth(Backend::Speech, "bad key"));
        assert_eq!(exit_code_for(&err), 77);

        let err = anyhow::Error::new(CliError::ChecksFailed(2));
        assert_eq!(exit_code_for(&err), 1);

        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 1);
    }
}
