//! Events emitted by the session controller for the UI.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ControllerPhase;
use crate::error::ErrorKind;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Cancelled,
}

/// Events emitted by the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Controller phase changed.
    PhaseChanged(ControllerPhase),

    /// A user message was accepted and sent to the chat backend.
    TurnStarted { text: String },

    /// A piece of the assistant response, in generation order.
    Fragment(String),

    /// A speech unit was handed to the avatar.
    SpeechQueued(String),

    /// Queued speech was discarded and playback halted.
    SpeechStopped,

    /// The chat backend throttled the request; retrying after `delay`.
    Retrying { delay: Duration },

    /// The turn ended. `complete` is false when only partial content was kept.
    TurnFinished { status: TurnStatus, complete: bool },

    /// Conversation history was emptied.
    HistoryCleared,

    /// An operation failed.
    Error { kind: ErrorKind, message: String },
}
