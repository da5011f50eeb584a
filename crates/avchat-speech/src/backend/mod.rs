//! Avatar backend abstraction.
//!
//! Defines the [`AvatarBackend`] trait the speech queue worker drives. The
//! Azure implementation lives in [`azure`]; tests plug in their own.

pub mod azure;

use async_trait::async_trait;
use avchat_core::SpeechSettings;
use serde::{Deserialize, Serialize};

use crate::error::SpeechResult;

pub use azure::AzureAvatarBackend;

/// ICE relay credentials for the avatar's WebRTC stream.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayToken {
    #[serde(rename = "Urls")]
    pub urls: Vec<String>,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub credential: String,
}

impl std::fmt::Debug for RelayToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayToken")
            .field("urls", &self.urls)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// What a successful connect produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarConnection {
    pub relay: Option<RelayToken>,
    pub character: String,
    pub style: String,
}

/// Backend that turns text into avatar speech.
#[async_trait]
pub trait AvatarBackend: Send + Sync {
    /// Authenticate and prepare the avatar.
    async fn connect(&self, settings: &SpeechSettings) -> SpeechResult<AvatarConnection>;

    /// Speak one SSML document. Resolves when the utterance has finished.
    async fn speak(&self, ssml: &str) -> SpeechResult<()>;

    /// Interrupt the current utterance.
    async fn stop_speaking(&self) -> SpeechResult<()>;

    /// Drop credentials and release resources.
    async fn disconnect(&self);
}
