//! Conversation Formatter
//!
//! Turns the displayed conversation into the history the model sees.
//! Assistant turns lose their reasoning span, analysis markers are dropped,
//! and everything else passes through in order. Input is never mutated.

use sentinel_core::chat::{ChatMessage, ChatRole};

use crate::types::Message;

/// Opening marker of a reasoning span.
pub const REASONING_OPEN: &str = "<think>";

/// Closing marker of a reasoning span.
pub const REASONING_CLOSE: &str = "</think>";

/// Remove the first reasoning span and at most two newlines after it.
///
/// The result is trimmed. Text without a complete span is only trimmed.
pub fn strip_reasoning(content: &str) -> String {
    let Some(open) = content.find(REASONING_OPEN) else {
        return content.trim().to_string();
    };
    let after_open = open + REASONING_OPEN.len();
    let Some(close_rel) = content[after_open..].find(REASONING_CLOSE) else {
        return content.trim().to_string();
    };

    let mut end = after_open + close_rel + REASONING_CLOSE.len();
    for _ in 0..2 {
        if content[end..].starts_with('\n') {
            end += 1;
        }
    }

    let mut stripped = String::with_capacity(content.len() - (end - open));
    stripped.push_str(&content[..open]);
    stripped.push_str(&content[end..]);
    stripped.trim().to_string()
}

/// Build the model-facing history from the conversation.
pub fn format_for_model(history: &[ChatMessage]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|message| match message.role() {
            ChatRole::System => Some(Message::system(message.content())),
            ChatRole::User => Some(Message::user(message.content())),
            ChatRole::Assistant => Some(Message::assistant(strip_reasoning(message.content()))),
            ChatRole::Analysis => None,
        })
        .collect()
}
