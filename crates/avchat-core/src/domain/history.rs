//! Conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Parse a role from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Convert role to its wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One user or assistant contribution to the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// False for assistant content kept after a failed or cancelled stream.
    pub complete: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text.into(), true)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text.into(), true)
    }

    /// Assistant content that stopped before the response finished.
    pub fn partial_assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text.into(), false)
    }

    fn new(role: TurnRole, text: String, complete: bool) -> Self {
        Self {
            role,
            text,
            timestamp: Utc::now(),
            complete,
        }
    }
}

/// Position in the history, used to undo a turn that produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryMark {
    generation: u64,
    len: usize,
}

/// Ordered turns, replayed verbatim on every chat request.
///
/// Every `clear` starts a new generation so a turn that began before the
/// clear can tell that its bookkeeping no longer applies.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<Turn>,
    generation: u64,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.generation += 1;
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mark(&self) -> HistoryMark {
        HistoryMark {
            generation: self.generation,
            len: self.turns.len(),
        }
    }

    /// Whether `mark` was taken in the current generation.
    pub const fn is_current(&self, mark: HistoryMark) -> bool {
        mark.generation == self.generation
    }

    /// Drop everything appended after `mark`.
    ///
    /// Returns false, leaving the history alone, if it was cleared since.
    pub fn rollback(&mut self, mark: HistoryMark) -> bool {
        if !self.is_current(mark) {
            return false;
        }
        self.turns.truncate(mark.len);
        true
    }
}
