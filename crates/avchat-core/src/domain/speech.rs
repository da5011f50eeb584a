//! Speech queue items.

use serde::{Deserialize, Serialize};

/// Per-item synthesis options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Voice to use instead of the session default.
    pub voice: Option<String>,
    /// Silence appended after the utterance, in milliseconds.
    pub ending_silence_ms: u32,
}

/// Text waiting to be spoken by the avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechQueueItem {
    pub text: String,
    pub options: SynthesisOptions,
}

impl SpeechQueueItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: SynthesisOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }
}
