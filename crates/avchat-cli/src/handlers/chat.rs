//! Chat command handler.
//!
//! Opens the avatar session and runs a read-send loop until the user quits.
//! Session events are rendered while each controller call is in flight, so
//! streamed fragments appear as they arrive.

use std::future::Future;
use std::io::Stdout;

use anyhow::Result;
use avchat_core::{AvatarError, SessionController, SessionEvent, SettingsOverrides, TurnStatus};
use tokio::signal;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::repl::{HELP, LineEvent, LineReader, ReplCommand};
use crate::presentation::tables::format_session;
use crate::presentation::{BOLD, DIM, EventPrinter, RED, RESET, print_history};

const PROMPT: &str = "you> ";

/// Execute the chat command.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    ctx.settings
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let (controller, events) = ctx.session_controller();
    let mut pump = EventPump {
        events,
        printer: EventPrinter::stdout(),
    };

    println!(
        "{BOLD}avchat{RESET} {DIM}voice {}, avatar {}/{}. Type /help for commands.{RESET}",
        ctx.settings.tts_voice, ctx.settings.avatar_character, ctx.settings.avatar_style
    );

    if let Err(e) = pump.drive(&controller, controller.open_avatar_session()).await {
        return Err(CliError::from(e).into());
    }

    let mut input = LineReader::spawn()?;
    loop {
        let line = match input.read_line(PROMPT).await {
            LineEvent::Line(line) => line,
            LineEvent::Interrupted => {
                println!("{DIM}(type /quit to leave){RESET}");
                continue;
            }
            LineEvent::Eof => break,
            LineEvent::Failed(message) => {
                tracing::warn!(error = %message, "Reading input failed");
                break;
            }
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Message(text) => pump.turn(&controller, text).await,
            ReplCommand::Open => {
                let result = pump.drive(&controller, controller.open_avatar_session()).await;
                show_error(result);
            }
            ReplCommand::Close => {
                let result = pump.drive(&controller, controller.close_avatar_session()).await;
                show_error(result);
            }
            ReplCommand::Stop => {
                pump.drive(&controller, controller.stop_speaking()).await;
            }
            ReplCommand::Clear => {
                controller.clear_history();
                pump.flush();
            }
            ReplCommand::History => print_history(&controller.history()),
            ReplCommand::Status => {
                println!(
                    "{} ({})",
                    controller.phase(),
                    format_session(controller.session().as_ref())
                );
            }
            ReplCommand::Voice(voice) => {
                let overrides = SettingsOverrides {
                    tts_voice: Some(voice.to_string()),
                    ..SettingsOverrides::default()
                };
                match controller.update_settings(&overrides) {
                    Ok(()) => println!("{DIM}Voice set to {voice}.{RESET}"),
                    Err(e) => report(&e),
                }
            }
            ReplCommand::Unknown(command) => {
                println!("Unknown command: {command}. Type /help for commands.");
            }
        }
    }

    drop(input);
    let result = pump.drive(&controller, controller.close_avatar_session()).await;
    show_error(result);
    Ok(())
}

/// Renders session events while controller calls are awaited.
struct EventPump {
    events: UnboundedReceiver<SessionEvent>,
    printer: EventPrinter<Stdout>,
}

impl EventPump {
    /// Await `operation`, rendering events as they arrive. Ctrl+C cancels
    /// the running turn, if any.
    async fn drive<T>(
        &mut self,
        controller: &SessionController,
        operation: impl Future<Output = T>,
    ) -> T {
        tokio::pin!(operation);
        let result = loop {
            tokio::select! {
                biased;
                result = &mut operation => break result,
                Some(event) = self.events.recv() => self.render(&event),
                _ = signal::ctrl_c() => {
                    if controller.cancel_turn() {
                        tracing::debug!("Turn cancelled from the keyboard");
                    }
                }
            }
        };
        self.flush();
        result
    }

    async fn turn(&mut self, controller: &SessionController, text: &str) {
        match self.drive(controller, controller.send_message(text)).await {
            Ok(reply) if reply.status == TurnStatus::Cancelled => {
                tracing::debug!(chars = reply.text.len(), "Turn cancelled");
            }
            Ok(reply) => {
                tracing::debug!(
                    chars = reply.text.len(),
                    spoken_units = reply.spoken_units,
                    "Turn finished"
                );
            }
            Err(e) => report(&e),
        }
    }

    /// Render events already queued.
    fn flush(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.render(&event);
        }
    }

    fn render(&mut self, event: &SessionEvent) {
        if let Err(e) = self.printer.handle(event) {
            tracing::warn!(error = %e, "Writing to the terminal failed");
        }
    }
}

fn show_error<T>(result: Result<T, AvatarError>) {
    if let Err(e) = result {
        report(&e);
    }
}

fn report(err: &AvatarError) {
    eprintln!("{RED}Error: {err}{RESET}");
}
