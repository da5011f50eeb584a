//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where the adapters are wired together:
//! - Audio output and the Azure avatar backend (via avchat-speech)
//! - The queued speech client (via avchat-speech)
//! - The Azure OpenAI chat client (via avchat-chat)
//!
//! Command handlers receive the composed `CliContext` and build a
//! `SessionController` from it when they need one.

use std::sync::Arc;

use anyhow::Result;
use avchat_chat::AzureChatClient;
use avchat_core::{
    ChatCompletionPort, ControllerConfig, SessionController, SessionEvent, Settings,
    SettingsOverrides, SpeechAvatarPort,
};
use avchat_speech::{AudioOutput, AvatarSpeechClient, AzureAvatarBackend, PacedOutput};
use tokio::sync::mpsc::UnboundedReceiver;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Per-invocation settings from command-line flags.
    pub overrides: SettingsOverrides,
    /// Controller tuning.
    pub controller: ControllerConfig,
}

impl CliConfig {
    pub fn new(overrides: SettingsOverrides) -> Self {
        Self {
            overrides,
            controller: ControllerConfig::default(),
        }
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// Settings resolved from the environment plus overrides. Not validated.
    pub settings: Settings,
    /// Direct backend access for connectivity probes.
    pub speech_backend: Arc<AzureAvatarBackend>,
    /// Queued speech client used by the controller.
    pub speech: Arc<AvatarSpeechClient>,
    pub chat: Arc<AzureChatClient>,
    pub controller_config: ControllerConfig,
}

impl CliContext {
    /// Build a controller over the shared adapters.
    pub fn session_controller(&self) -> (SessionController, UnboundedReceiver<SessionEvent>) {
        let speech: Arc<dyn SpeechAvatarPort> = self.speech.clone();
        let chat: Arc<dyn ChatCompletionPort> = self.chat.clone();
        SessionController::new(
            self.settings.clone(),
            speech,
            chat,
            self.controller_config.clone(),
        )
    }
}

/// Bootstrap the CLI application.
///
/// Loads settings from the process environment (after `.env` has been read)
/// and creates the HTTP clients. No network traffic happens here.
pub fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let settings = Settings::load(&config.overrides);

    let output: Arc<dyn AudioOutput> = Arc::new(PacedOutput::new());
    let speech_backend = Arc::new(AzureAvatarBackend::new(output)?);
    let speech = Arc::new(AvatarSpeechClient::new(speech_backend.clone()));
    let chat = Arc::new(AzureChatClient::new()?);

    tracing::debug!(
        region = %settings.speech_region,
        deployment = %settings.chat_deployment,
        "CLI context ready"
    );

    Ok(CliContext {
        settings,
        speech_backend,
        speech,
        chat,
        controller_config: config.controller,
    })
}
