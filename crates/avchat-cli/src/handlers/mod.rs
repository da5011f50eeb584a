//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that call the controller or an adapter probe and format
//!   the outcome for the terminal
//!
//! Failures are returned as `CliError` so `main` can pick the exit code.

pub mod chat;
pub mod check;
pub mod config;
pub mod repl;
