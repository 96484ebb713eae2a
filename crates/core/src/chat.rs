//! Conversation Types
//!
//! A conversation is an ordered, append-only sequence of [`ChatMessage`]s.
//! The role of a message is fixed at construction; there is no setter.

use serde::{Deserialize, Serialize};

/// Who authored a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Configures model behavior; never displayed.
    System,
    /// Typed by the user.
    User,
    /// Produced by the model (or a fallback message on failure).
    Assistant,
    /// Placeholder where an analysis report is rendered; never sent to the model.
    Analysis,
}

impl ChatRole {
    /// Whether messages with this role may be forwarded to the model.
    pub fn is_model_visible(self) -> bool {
        !matches!(self, ChatRole::Analysis)
    }

    /// Whether messages with this role are shown to the user.
    pub fn is_user_visible(self) -> bool {
        !matches!(self, ChatRole::System)
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Analysis => "analysis",
        };
        f.write_str(s)
    }
}

/// A single conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    role: ChatRole,
    content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// An analysis placeholder. It carries no text payload.
    pub fn analysis_marker() -> Self {
        Self::new(ChatRole::Analysis, String::new())
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}
