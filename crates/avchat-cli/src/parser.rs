//! Main CLI parser and top-level argument handling.
//!
//! Global flags override individual settings for this invocation; secrets
//! only ever come from the environment or a `.env` file.

use avchat_core::SettingsOverrides;
use clap::Parser;

use crate::commands::Commands;

/// Talk to an Azure avatar backed by an Azure OpenAI deployment.
#[derive(Parser, Debug)]
#[command(name = "avchat")]
#[command(about = "Chat with a talking Azure avatar from the terminal")]
#[command(version)]
pub struct Cli {
    /// Azure Speech region (e.g. westus2)
    #[arg(long = "speech-region", global = true)]
    pub speech_region: Option<String>,

    /// Text-to-speech voice (e.g. en-US-AvaMultilingualNeural)
    #[arg(long, global = true)]
    pub voice: Option<String>,

    /// Avatar character (e.g. lisa)
    #[arg(long, global = true)]
    pub character: Option<String>,

    /// Avatar style (e.g. casual-sitting)
    #[arg(long, global = true)]
    pub style: Option<String>,

    /// Azure OpenAI deployment name
    #[arg(long, global = true)]
    pub deployment: Option<String>,

    /// Wait for the whole response instead of streaming it
    #[arg(long = "no-stream", global = true)]
    pub no_stream: bool,

    /// System prompt sent with every request
    #[arg(long = "system-prompt", global = true)]
    pub system_prompt: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Settings overrides carried by the global flags.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            speech_region: self.speech_region.clone(),
            tts_voice: self.voice.clone(),
            avatar_character: self.character.clone(),
            avatar_style: self.style.clone(),
            chat_deployment: self.deployment.clone(),
            system_prompt: self.system_prompt.clone(),
            stream_responses: self.no_stream.then_some(false),
            ..SettingsOverrides::default()
        }
    }
}
