//! Table formatting utilities for CLI output.

use avchat_core::{Session, Settings, Turn, TurnRole};

use super::{BOLD, DIM, RESET};

/// Truncates a string to a maximum number of characters, adding "..." if needed.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Print the redacted settings summary as a two-column table.
pub fn print_settings_summary(settings: &Settings) {
    println!("{BOLD}Settings:{RESET}");
    print_separator(60);
    for (label, value) in settings.summary() {
        println!("  {label:<20} {}", truncate_string(&value, 60));
    }
}

/// Print the conversation so far, one line per turn.
pub fn print_history(turns: &[Turn]) {
    if turns.is_empty() {
        println!("{DIM}(no messages yet){RESET}");
        return;
    }
    for turn in turns {
        let speaker = match turn.role {
            TurnRole::User => "you",
            TurnRole::Assistant => "avatar",
        };
        let marker = if turn.complete { "" } else { " (partial)" };
        println!(
            "{DIM}{}{RESET} {speaker:>6}> {}{marker}",
            turn.timestamp.format("%H:%M:%S"),
            turn.text
        );
    }
}

/// One-line description of the session, if any.
pub fn format_session(session: Option<&Session>) -> String {
    session.map_or_else(
        || "no avatar session".to_string(),
        |session| {
            format!(
                "session {} {} since {}, last activity {}",
                session.id,
                session.state,
                session.created_at.format("%H:%M:%S"),
                session.last_activity.format("%H:%M:%S"),
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("größer als", 6), "grö...");
    }

    #[test]
    fn test_format_session_without_session() {
        assert_eq!(format_session(None), "no avatar session");
    }
}
