//! Multi-turn conversation state for generation and revision rounds.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged turn sent to the completion backend.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only turn sequence.
///
/// Invariant: once non-empty, the first turn is the system turn. Revision
/// rounds only ever append.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// First generation request: system context plus the initial key messages.
    pub fn start(system_context: String, key_messages: String) -> Self {
        Self {
            turns: vec![Turn::system(system_context), Turn::user(key_messages)],
        }
    }

    /// Append a revision round: the prior completed reply as an assistant
    /// turn, then the revision instructions as a user turn.
    pub fn add_revision(&mut self, prior_reply: &str, instructions: &str) {
        self.turns.push(Turn::assistant(prior_reply));
        self.turns.push(Turn::user(instructions));
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
}
