//! Core domain types.
//!
//! These types represent the in-memory model of a conversation with the
//! avatar, independent of the services that produce speech or responses.
//!
//! # Structure
//!
//! - `history` - Chat turns and the ordered conversation history
//! - `session` - Avatar session lifecycle and controller phases
//! - `speech` - Items handed to the speech queue

pub mod history;
pub mod session;
pub mod speech;

// Re-export history types at the domain level for convenience
pub use history::{ChatHistory, HistoryMark, Turn, TurnRole};

// Re-export session types at the domain level for convenience
pub use session::{ControllerPhase, Session, SessionState};

// Re-export speech types at the domain level for convenience
pub use speech::{SpeechQueueItem, SynthesisOptions};
