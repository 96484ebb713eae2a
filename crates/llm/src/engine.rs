//! Inference Engine Traits
//!
//! The only external boundary of the orchestration core. An engine is loaded
//! once through an [`EngineLoader`] and then shared read-only by every
//! operation.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use super::types::{Completion, CompletionOptions, LlmError, LlmResult, LoadProgress, Message};
use sentinel_core::streaming::StreamEvent;

/// Incremental events from a streaming completion, ending with
/// [`StreamEvent::Complete`].
pub type FragmentStream = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// Callback invoked with load progress reports.
pub type ProgressCallback = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// A live, initialized handle to a model.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Returns the engine name for identification.
    fn name(&self) -> &'static str;

    /// Returns the model identifier this handle serves.
    fn model(&self) -> &str;

    /// Open a streaming chat completion.
    ///
    /// Errors returned here mean the request never started; errors inside the
    /// stream mean it broke part-way.
    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<FragmentStream>;

    /// Run a non-streaming chat completion and return the whole message.
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<Completion>;
}

/// Creates engine handles. Loading may be slow (downloads, warm-up).
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Returns the backend name for logging.
    fn backend(&self) -> &'static str;

    /// Load `model_id`, reporting progress through `progress`.
    async fn load(
        &self,
        model_id: &str,
        progress: ProgressCallback,
    ) -> LlmResult<Arc<dyn InferenceEngine>>;
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, engine: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", engine),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", engine),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

/// Map a connection-level error message to the closest [`LlmError`].
pub fn classify_connection_error(message: String, base_url: &str) -> LlmError {
    if message.contains("connect") || message.contains("Connection refused") {
        LlmError::EngineUnavailable {
            message: format!("Cannot connect to {}: {}", base_url, message),
        }
    } else {
        LlmError::NetworkError { message }
    }
}
