//! Chat Orchestration Errors
//!
//! Failure taxonomy for the orchestration layer. Each variant is
//! distinguishable so callers can choose between retrying and reporting.
//! Nothing here is retried automatically.

use thiserror::Error;

use crate::types::LlmError;

/// Errors surfaced by the session, collector, and analysis requester.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// The engine failed to load. A later `ensure_ready()` retries.
    #[error("Engine initialization failed: {0}")]
    Initialization(LlmError),

    /// The stream broke after it was opened. `partial` holds whatever had
    /// been accumulated; it is the caller's decision whether to keep it.
    #[error("Stream failed: {source}")]
    Stream { source: LlmError, partial: String },

    /// The model's analysis output was not valid structured data.
    #[error("Failed to parse analysis results: {message}")]
    AnalysisParse { message: String, raw: String },

    /// Any other failure from an engine call.
    #[error("Engine request failed: {0}")]
    Transport(LlmError),

    /// The operation was invoked without its preconditions (e.g. no contract).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for orchestration operations
pub type ChatResult<T> = Result<T, ChatError>;

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        ChatError::Transport(err)
    }
}

impl ChatError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Short machine-readable tag, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Initialization(_) => "initialization",
            ChatError::Stream { .. } => "stream",
            ChatError::AnalysisParse { .. } => "analysis_parse",
            ChatError::Transport(_) => "transport",
            ChatError::InvalidInput(_) => "invalid_input",
        }
    }
}
