//! Talking-avatar speech client.
//!
//! [`AvatarSpeechClient`] implements the core `SpeechAvatarPort`: `speak`
//! appends to a FIFO queue and returns immediately, and a background worker
//! synthesizes one item at a time through an [`AvatarBackend`].
//!
//! The production backend, [`AzureAvatarBackend`], issues an Azure Speech
//! token, fetches the avatar relay (ICE) credentials, and posts SSML to the
//! TTS REST endpoint. Synthesized audio goes to an [`AudioOutput`] sink.

#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod client;
pub mod error;
pub mod output;
mod queue;
pub mod ssml;

pub use backend::{AvatarBackend, AvatarConnection, AzureAvatarBackend, RelayToken};
pub use client::AvatarSpeechClient;
pub use error::{SpeechClientError, SpeechResult};
pub use output::{AudioOutput, DiscardOutput, PacedOutput};

// Silence unused dev-dependency warnings for the lib test target
#[cfg(test)]
use mockito as _;

