//! Engine Types
//!
//! Request, response, configuration, and error types shared by every
//! inference engine implementation.

use serde::{Deserialize, Serialize};

use crate::variant::{ModelCatalog, VariantPreference};

/// Inference backend selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    /// Local Ollama server via the native SDK
    Ollama,
    /// Any server speaking the OpenAI chat-completions protocol
    /// (llama.cpp server, MLC LLM serve, vLLM, LM Studio)
    OpenaiCompatible,
}

impl EngineBackend {
    pub fn default_base_url(self) -> &'static str {
        match self {
            EngineBackend::Ollama => "http://localhost:11434",
            EngineBackend::OpenaiCompatible => "http://localhost:8080/v1",
        }
    }
}

impl std::fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineBackend::Ollama => f.write_str("ollama"),
            EngineBackend::OpenaiCompatible => f.write_str("openai_compatible"),
        }
    }
}

impl std::str::FromStr for EngineBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ollama" => Ok(EngineBackend::Ollama),
            "openai_compatible" | "openai" => Ok(EngineBackend::OpenaiCompatible),
            other => Err(format!("unknown engine backend: {}", other)),
        }
    }
}

/// Configuration for connecting to an inference engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which backend implementation to use
    pub backend: EngineBackend,
    /// Base URL override (uses the backend default if None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Bearer token for OpenAI-compatible servers that require one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifiers per variant
    #[serde(default)]
    pub models: ModelCatalog,
    /// Which variant to load
    #[serde(default)]
    pub variant: VariantPreference,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::Ollama,
            base_url: None,
            api_key: None,
            models: ModelCatalog::default(),
            variant: VariantPreference::Auto,
        }
    }
}

impl EngineConfig {
    /// Base URL with the backend default applied.
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url())
    }
}

/// Model-facing message role. There is deliberately no analysis role here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A message as submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Shape constraint on the model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object (shape described in the prompt)
    JsonObject,
}

/// Per-request options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionOptions {
    /// Sampling temperature (engine default if None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Response shape constraint
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Ask the engine to report token usage at the end of a stream
    #[serde(default)]
    pub include_usage: bool,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of input/prompt tokens
    pub input_tokens: u32,
    /// Number of output/completion tokens
    pub output_tokens: u32,
}

impl UsageStats {
    /// Total tokens used
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Stop reason for the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    EndTurn,
    /// Hit max tokens limit
    MaxTokens,
    /// Other/unknown reason
    Other(String),
}

impl From<&str> for StopReason {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "end_turn" | "stop" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// A complete, non-streamed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Text content of the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Why the response ended
    pub stop_reason: StopReason,
    /// Token usage statistics
    pub usage: UsageStats,
    /// The model that generated the response
    pub model: String,
}

/// Progress report emitted while an engine loads a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProgress {
    /// Human-readable stage description
    pub text: String,
    /// Completion ratio in `[0.0, 1.0]` when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f32>,
}

impl LoadProgress {
    pub fn stage(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fraction: None,
        }
    }

    /// Progress from byte counters, clamped to `[0.0, 1.0]`.
    pub fn bytes(text: impl Into<String>, completed: u64, total: u64) -> Self {
        let fraction = if total == 0 {
            None
        } else {
            Some((completed as f64 / total as f64).clamp(0.0, 1.0) as f32)
        };
        Self {
            text: text.into(),
            fraction,
        }
    }
}

impl std::fmt::Display for LoadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fraction {
            Some(fraction) => write!(f, "{} ({:.0}%)", self.text, fraction * 100.0),
            None => f.write_str(&self.text),
        }
    }
}

/// Error types for engine operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// Authentication failed (invalid API key)
    AuthenticationFailed { message: String },
    /// Model not found or not available
    ModelNotFound { model: String },
    /// Invalid request (bad parameters)
    InvalidRequest { message: String },
    /// Server error from the engine
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Network/connection error
    NetworkError { message: String },
    /// Response parsing error
    ParseError { message: String },
    /// Engine not reachable (e.g., Ollama not running)
    EngineUnavailable { message: String },
    /// Other error
    Other { message: String },
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            LlmError::ModelNotFound { model } => {
                write!(f, "Model not found: {}", model)
            }
            LlmError::InvalidRequest { message } => {
                write!(f, "Invalid request: {}", message)
            }
            LlmError::ServerError { message, status } => {
                if let Some(s) = status {
                    write!(f, "Server error ({}): {}", s, message)
                } else {
                    write!(f, "Server error: {}", message)
                }
            }
            LlmError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            LlmError::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            LlmError::EngineUnavailable { message } => {
                write!(f, "Engine unavailable: {}", message)
            }
            LlmError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Result type for engine operations
pub type LlmResult<T> = Result<T, LlmError>;
