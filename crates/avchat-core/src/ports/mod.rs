//! Port definitions (trait abstractions) for external services.
//!
//! Ports define the interfaces the session controller expects from the
//! speech/avatar backend and the chat completion backend. They use only
//! domain types; adapters map their own errors into [`AvatarError`].
//!
//! [`AvatarError`]: crate::error::AvatarError

pub mod chat;
pub mod speech;

pub use chat::{ChatCompletionPort, ChatResponse, FragmentStream, ResponseMode};
pub use speech::SpeechAvatarPort;
