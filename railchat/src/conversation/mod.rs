//! Conversation history and the guarded turn orchestrator.

mod orchestrator;

pub use orchestrator::{
    DEFAULT_REJECTION_MESSAGE, Orchestrator, RejectionStage, TurnOutcome,
};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The remote model.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl Turn {
    /// Create a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only, ordered record of accepted turns.
///
/// Only the [`Orchestrator`] appends, and only content that passed the
/// blocking guardrails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Iterate over turns, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if no turn has been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns produced by `role`.
    #[must_use]
    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }

    /// Returns `true` if the latest turn is a user message with no reply yet.
    #[must_use]
    pub fn awaiting_reply(&self) -> bool {
        self.last().is_some_and(|turn| turn.role == Role::User)
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_append_and_query() {
        let mut history = ConversationHistory::new();
        assert!(history.is_empty());
        assert!(!history.awaiting_reply());

        history.push(Turn::user("hi"));
        assert!(history.awaiting_reply());

        history.push(Turn::assistant("hello"));
        assert!(!history.awaiting_reply());
        assert_eq!(history.len(), 2);
        assert_eq!(history.count(Role::User), 1);
        assert_eq!(history.count(Role::Assistant), 1);
        assert_eq!(history.last(), Some(&Turn::assistant("hello")));
    }

    #[test]
    fn test_history_serializes_as_messages() {
        let mut history = ConversationHistory::new();
        history.push(Turn::user("hi"));
        history.push(Turn::assistant("hello"));

        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
            ])
        );
    }
}
