//! Core domain for avchat: settings, chat history, session lifecycle, the
//! ports the external speech and chat services are reached through, and the
//! [`SessionController`] that ties them together.
//!
//! This crate has no HTTP or terminal dependencies. Adapters for the Azure
//! services live in `avchat-speech` and `avchat-chat`; the CLI in
//! `avchat-cli` is the composition root.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod services;
pub mod settings;
pub mod text;

// Re-export commonly used types for convenience
pub use domain::{
    ChatHistory, ControllerPhase, HistoryMark, Session, SessionState, SpeechQueueItem,
    SynthesisOptions, Turn, TurnRole,
};
pub use error::{AvatarError, Backend, ErrorKind};
pub use events::{SessionEvent, TurnStatus};
pub use ports::{ChatCompletionPort, ChatResponse, FragmentStream, ResponseMode, SpeechAvatarPort};
pub use services::{ControllerConfig, SessionController, TurnReply};
pub use settings::{
    Advisory, ChatSettings, ConfigError, FieldIssue, RetrievalSettings, Settings, SettingsField,
    SettingsOverrides, SpeechSettings,
};
