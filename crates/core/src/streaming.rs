//! Unified Stream Event Types
//!
//! Engine-agnostic event types and adapter trait for processing incremental
//! model output. Every inference backend converts its native chunk format to
//! [`StreamEvent`]s; a stream is terminated by [`StreamEvent::Complete`].

use serde::{Deserialize, Serialize};

/// Unified streaming event that all engine adapters convert to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text content delta from the model
    TextDelta { content: String },

    /// Reasoning delta reported out-of-band by the engine (not inline tags)
    ThinkingDelta { content: String },

    /// Token usage information
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },

    /// Error reported inside the stream
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Stream complete
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
}

impl StreamEvent {
    /// Shorthand for a text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            content: content.into(),
        }
    }

    /// Shorthand for the terminating sentinel.
    pub fn complete() -> Self {
        StreamEvent::Complete { stop_reason: None }
    }
}

/// Errors that can occur during stream adaptation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AdapterError {
    /// Invalid format that couldn't be parsed
    InvalidFormat(String),
    /// JSON/data parsing error
    ParseError(String),
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            AdapterError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Trait for adapting engine-specific line formats to unified events.
pub trait StreamAdapter: Send + Sync {
    /// Returns the engine name for logging and identification.
    fn engine_name(&self) -> &'static str;

    /// Adapt a raw stream line/chunk to unified events.
    ///
    /// A single input line may produce zero, one, or multiple events.
    fn adapt(&mut self, input: &str) -> Result<Vec<StreamEvent>, AdapterError>;

    /// Reset adapter state for a new stream.
    fn reset(&mut self) {}
}
