//! Line input for the interactive chat.
//!
//! rustyline blocks, so the editor lives on its own thread. The async side
//! sends a prompt and awaits the answer; the thread only reads while a
//! prompt is outstanding, which leaves Ctrl+C to the turn loop otherwise.

use std::sync::mpsc as std_mpsc;
use std::thread;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

/// A parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    /// Blank line.
    Empty,
    /// Text to send to the assistant.
    Message(&'a str),
    Open,
    Close,
    Stop,
    Clear,
    History,
    Status,
    /// Change the TTS voice; only allowed while no session is open.
    Voice(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> ReplCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line);
        };

        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, arg)| (name, arg.trim()));
        match name.to_ascii_lowercase().as_str() {
            "open" => Self::Open,
            "close" => Self::Close,
            "stop" => Self::Stop,
            "clear" => Self::Clear,
            "history" => Self::History,
            "status" => Self::Status,
            "voice" if !arg.is_empty() => Self::Voice(arg),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => Self::Unknown(line),
        }
    }
}

/// Help text for the REPL commands.
pub const HELP: &str = "\
Commands:
  /open            open the avatar session
  /close           close the avatar session
  /stop            stop the avatar speaking
  /clear           clear the conversation history
  /history         show the conversation so far
  /status          show the session state
  /voice <name>    change the TTS voice (session must be closed)
  /help            show this help
  /quit            leave
Anything else is sent to the assistant. Ctrl+C cancels a running reply.";

/// Outcome of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D or closed input.
    Eof,
    Failed(String),
}

/// Async front for a rustyline editor running on a dedicated thread.
pub struct LineReader {
    prompts: std_mpsc::Sender<String>,
    lines: mpsc::UnboundedReceiver<LineEvent>,
}

impl LineReader {
    pub fn spawn() -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let (prompt_tx, prompt_rx) = std_mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("avchat-input".to_string())
            .spawn(move || {
                while let Ok(prompt) = prompt_rx.recv() {
                    let event = match editor.readline(&prompt) {
                        Ok(line) => {
                            if !line.trim().is_empty() {
                                let _ = editor.add_history_entry(line.as_str());
                            }
                            LineEvent::Line(line)
                        }
                        Err(ReadlineError::Interrupted) => LineEvent::Interrupted,
                        Err(ReadlineError::Eof) => LineEvent::Eof,
                        Err(e) => LineEvent::Failed(e.to_string()),
                    };
                    if line_tx.send(event).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            prompts: prompt_tx,
            lines: line_rx,
        })
    }

    /// Show `prompt` and wait for the next line.
    pub async fn read_line(&mut self, prompt: &str) -> LineEvent {
        if self.prompts.send(prompt.to_string()).is_err() {
            return LineEvent::Eof;
        }
        self.lines.recv().await.unwrap_or(LineEvent::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            ReplCommand::parse("  What is Azure?  "),
            ReplCommand::Message("What is Azure?")
        );
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(ReplCommand::parse("/open"), ReplCommand::Open);
        assert_eq!(ReplCommand::parse("/STOP"), ReplCommand::Stop);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/?"), ReplCommand::Help);
        assert_eq!(
            ReplCommand::parse("/voice  en-GB-SoniaNeural "),
            ReplCommand::Voice("en-GB-SoniaNeural")
        );
    }

    #[test]
    fn test_voice_without_name_is_unknown() {
        assert_eq!(ReplCommand::parse("/voice"), ReplCommand::Unknown("/voice"));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            ReplCommand::parse("/dance now"),
            ReplCommand::Unknown("/dance now")
        );
    }
}
