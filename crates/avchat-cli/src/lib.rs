//! Terminal front end for avchat.
//!
//! `bootstrap` wires the Azure speech and chat adapters into a
//! [`CliContext`]; `handlers` implement the `chat`, `config` and `check`
//! commands on top of it.

#![deny(unused_crate_dependencies)]

// Used by main.rs only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use error::{CliError, exit_code_for};
pub use parser::Cli;
