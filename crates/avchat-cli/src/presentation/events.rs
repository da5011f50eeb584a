//! Terminal rendering of session events.

use std::io::{self, Write};

use avchat_core::{ControllerPhase, SessionEvent, TurnStatus};

use super::{DIM, RESET, YELLOW};

/// Writes session events to a terminal as they arrive.
///
/// Fragments are printed inline after an `avatar>` prefix; everything else
/// goes on its own line.
pub struct EventPrinter<W: Write> {
    out: W,
    phase: ControllerPhase,
    mid_line: bool,
}

impl EventPrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> EventPrinter<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out,
            phase: ControllerPhase::Idle,
            mid_line: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::PhaseChanged(phase) => {
                let previous = std::mem::replace(&mut self.phase, *phase);
                match (previous, *phase) {
                    (_, ControllerPhase::Opening) => self.note("Connecting to the avatar...")?,
                    (ControllerPhase::Opening, ControllerPhase::SessionOpen) => {
                        self.note("Avatar session open.")?;
                    }
                    (ControllerPhase::Closing, ControllerPhase::Idle) => {
                        self.note("Avatar session closed.")?;
                    }
                    _ => {}
                }
            }
            SessionEvent::TurnStarted { .. } => {
                self.break_line()?;
                write!(self.out, "avatar> ")?;
                self.mid_line = true;
            }
            SessionEvent::Fragment(text) => {
                write!(self.out, "{text}")?;
                self.mid_line = true;
            }
            SessionEvent::SpeechQueued(unit) => {
                tracing::debug!(unit = %unit, "Speech unit queued");
            }
            SessionEvent::SpeechStopped => self.note("(speech stopped)")?,
            SessionEvent::Retrying { delay } => {
                self.note(&format!(
                    "{YELLOW}(rate limited, retrying in {:.1}s){RESET}",
                    delay.as_secs_f32()
                ))?;
            }
            SessionEvent::TurnFinished { status, complete } => {
                self.break_line()?;
                match (status, complete) {
                    (TurnStatus::Cancelled, true) => self.note("(cancelled)")?,
                    (TurnStatus::Cancelled, false) => self.note("(cancelled, partial response kept)")?,
                    (TurnStatus::Completed, false) => self.note("(partial response kept)")?,
                    (TurnStatus::Completed, true) => {}
                }
            }
            SessionEvent::HistoryCleared => self.note("History cleared.")?,
            // Returned errors are printed by the command that caused them
            SessionEvent::Error { kind, message } => {
                tracing::debug!(%kind, %message, "Session error event");
            }
        }
        self.out.flush()
    }

    fn note(&mut self, text: &str) -> io::Result<()> {
        self.break_line()?;
        writeln!(self.out, "{DIM}{text}{RESET}")
    }

    fn break_line(&mut self) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::assert_ok;

    use super::*;

    fn render(events: &[SessionEvent]) -> String {
        let mut printer = EventPrinter::new(Vec::new());
        for event in events {
            assert_ok!(printer.handle(event));
        }
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_fragments_print_inline() {
        let out = render(&[
            SessionEvent::TurnStarted {
                text: "hi".to_string(),
            },
            SessionEvent::Fragment("Hello".to_string()),
            SessionEvent::SpeechQueued("Hello there.".to_string()),
            SessionEvent::Fragment(" there.".to_string()),
            SessionEvent::TurnFinished {
                status: TurnStatus::Completed,
                complete: true,
            },
        ]);
        assert_eq!(out, "avatar> Hello there.\n");
    }

    #[test]
    fn test_cancelled_turn_is_noted_on_new_line() {
        let out = render(&[
            SessionEvent::TurnStarted {
                text: "hi".to_string(),
            },
            SessionEvent::Fragment("Partial".to_string()),
            SessionEvent::TurnFinished {
                status: TurnStatus::Cancelled,
                complete: false,
            },
        ]);
        assert!(out.starts_with("avatar> Partial\n"));
        assert!(out.contains("(cancelled, partial response kept)"));
    }

    #[test]
    fn test_session_open_and_close_notes() {
        let out = render(&[
            SessionEvent::PhaseChanged(ControllerPhase::Opening),
            SessionEvent::PhaseChanged(ControllerPhase::SessionOpen),
            SessionEvent::PhaseChanged(ControllerPhase::TurnInProgress),
            SessionEvent::PhaseChanged(ControllerPhase::SessionOpen),
            SessionEvent::PhaseChanged(ControllerPhase::Closing),
            SessionEvent::PhaseChanged(ControllerPhase::Idle),
        ]);
        assert_eq!(out.matches("Avatar session open.").count(), 1);
        assert!(out.contains("Avatar session closed."));
    }

    #[test]
    fn test_retry_note() {
        let out = render(&[SessionEvent::Retrying {
            delay: Duration::from_secs(2),
        }]);
        assert!(out.contains("retrying in 2.0s"));
    }
}
