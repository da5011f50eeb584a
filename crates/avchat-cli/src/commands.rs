//! Available subcommands.

use clap::Subcommand;

/// Subcommands of `avchat`. Without one, `chat` runs.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive avatar chat session
    Chat,

    /// Show the effective settings (keys redacted) and whether they validate
    Config,

    /// Validate settings and probe speech, chat and search connectivity
    Check,
}
