//! Ollama Engine
//!
//! Inference over a local Ollama server using the ollama-rs native SDK.
//! Loading checks the server's local model list and pulls the model with
//! streamed byte progress when it is missing.

use std::sync::Arc;

use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::{ChatMessage, ChatMessageResponse, MessageRole as OllamaRole};
use ollama_rs::generation::parameters::FormatType;
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use sentinel_core::streaming::StreamEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::engine::{
    classify_connection_error, EngineLoader, FragmentStream, InferenceEngine, ProgressCallback,
};
use crate::http_client::build_http_client;
use crate::types::{
    Completion, CompletionOptions, LlmError, LlmResult, LoadProgress, Message, MessageRole,
    ResponseFormat, StopReason, UsageStats,
};

/// Default Ollama API port
const OLLAMA_DEFAULT_PORT: u16 = 11434;

/// Buffered events between the SDK stream and the consumer
const STREAM_BUFFER: usize = 64;

/// Create an Ollama SDK client from a base URL string.
///
/// `Ollama::new()` takes host and port separately, so the URL is split here.
fn create_client(base_url: &str) -> LlmResult<Ollama> {
    let parsed = url::Url::parse(base_url).map_err(|e| LlmError::InvalidRequest {
        message: format!("Invalid Ollama URL {}: {}", base_url, e),
    })?;
    let host = parsed.host_str().unwrap_or("localhost");
    let port = parsed.port().unwrap_or(OLLAMA_DEFAULT_PORT);
    let host_url = format!("{}://{}", parsed.scheme(), host);
    Ok(Ollama::new_with_client(host_url, port, build_http_client()?))
}

/// Whether a locally installed model name satisfies the requested one.
///
/// Ollama lists untagged models as `name:latest`.
fn model_matches(local: &str, wanted: &str) -> bool {
    if local == wanted {
        return true;
    }
    !wanted.contains(':') && local.strip_suffix(":latest") == Some(wanted)
}

fn to_ollama_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                MessageRole::System => OllamaRole::System,
                MessageRole::User => OllamaRole::User,
                MessageRole::Assistant => OllamaRole::Assistant,
            };
            ChatMessage::new(role, msg.content.clone())
        })
        .collect()
}

fn usage_of(response: &ChatMessageResponse) -> Option<UsageStats> {
    response.final_data.as_ref().map(|final_data| UsageStats {
        input_tokens: final_data.prompt_eval_count as u32,
        output_tokens: final_data.eval_count as u32,
    })
}

/// Convert one SDK chunk into stream events.
fn chunk_events(response: &ChatMessageResponse) -> Vec<StreamEvent> {
    let msg = &response.message;
    let mut events = Vec::new();

    if let Some(thinking) = msg.thinking.as_ref().filter(|t| !t.is_empty()) {
        events.push(StreamEvent::ThinkingDelta {
            content: thinking.clone(),
        });
    }
    if !msg.content.is_empty() {
        events.push(StreamEvent::text(msg.content.clone()));
    }

    if response.done {
        if let Some(usage) = usage_of(response) {
            events.push(StreamEvent::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            });
        }
        events.push(StreamEvent::Complete {
            stop_reason: Some("stop".to_string()),
        });
    }

    events
}

/// Error for a chat stream the SDK cut off while reading the response body.
///
/// The SDK reports these failures without detail, so the context is
/// rebuilt from what the pump knows.
fn stream_error(model: &str, base_url: &str, chunks: usize) -> LlmError {
    LlmError::NetworkError {
        message: format!(
            "Ollama stream for {} at {} failed while reading the response body after {} chunks",
            model, base_url, chunks
        ),
    }
}

/// A loaded model on an Ollama server
pub struct OllamaEngine {
    client: Ollama,
    model: String,
    base_url: String,
}

impl OllamaEngine {
    fn new(client: Ollama, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    /// Build a ChatMessageRequest from our unified types
    fn build_chat_request(&self, messages: &[Message], options: &CompletionOptions) -> ChatMessageRequest {
        let mut request = ChatMessageRequest::new(self.model.clone(), to_ollama_messages(messages));

        if let Some(temperature) = options.temperature {
            request = request.options(ModelOptions::default().temperature(temperature));
        }
        if options.response_format == ResponseFormat::JsonObject {
            request = request.format(FormatType::Json);
        }

        request
    }

    fn map_request_error(&self, message: String) -> LlmError {
        if message.contains("not found") || message.contains("404") {
            LlmError::ModelNotFound {
                model: self.model.clone(),
            }
        } else {
            classify_connection_error(message, &self.base_url)
        }
    }
}

#[async_trait]
impl InferenceEngine for OllamaEngine {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<FragmentStream> {
        let request = self.build_chat_request(&messages, &options);

        let mut stream = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| self.map_request_error(e.to_string()))?;

        let model = self.model.clone();
        let base_url = self.base_url.clone();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut chunks = 0usize;
            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(response) => {
                        chunks += 1;
                        for event in chunk_events(&response) {
                            if tx.send(Ok(event)).await.is_err() {
                                return;
                            }
                        }
                        if response.done {
                            return;
                        }
                    }
                    Err(()) => {
                        let err = stream_error(&model, &base_url, chunks);
                        tracing::warn!(model = %model, chunks, "Ollama chat stream failed");
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<Completion> {
        let request = self.build_chat_request(&messages, &options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| self.map_request_error(e.to_string()))?;

        let content = if response.message.content.is_empty() {
            None
        } else {
            Some(response.message.content.clone())
        };

        Ok(Completion {
            content,
            stop_reason: StopReason::EndTurn,
            usage: usage_of(&response).unwrap_or_default(),
            model: response.model.clone(),
        })
    }
}

/// Loads models on an Ollama server, pulling them when absent
pub struct OllamaLoader {
    client: Ollama,
    base_url: String,
}

impl OllamaLoader {
    pub fn new(base_url: &str) -> LlmResult<Self> {
        Ok(Self {
            client: create_client(base_url)?,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn pull_error(&self, model_id: &str, message: String) -> LlmError {
        if message.contains("not found") || message.contains("does not exist") {
            LlmError::ModelNotFound {
                model: model_id.to_string(),
            }
        } else {
            classify_connection_error(message, &self.base_url)
        }
    }

    async fn pull(&self, model_id: &str, progress: &ProgressCallback) -> LlmResult<()> {
        tracing::info!(model = %model_id, "Model not present locally, pulling from registry");

        let mut stream = self
            .client
            .pull_model_stream(model_id.to_string(), false)
            .await
            .map_err(|e| self.pull_error(model_id, e.to_string()))?;

        while let Some(status) = stream.next().await {
            let status = status.map_err(|e| self.pull_error(model_id, e.to_string()))?;
            let report = match (status.completed, status.total) {
                (Some(completed), Some(total)) => {
                    LoadProgress::bytes(status.message, completed, total)
                }
                _ => LoadProgress::stage(status.message),
            };
            progress(report);
        }

        Ok(())
    }
}

#[async_trait]
impl EngineLoader for OllamaLoader {
    fn backend(&self) -> &'static str {
        "ollama"
    }

    async fn load(
        &self,
        model_id: &str,
        progress: ProgressCallback,
    ) -> LlmResult<Arc<dyn InferenceEngine>> {
        progress(LoadProgress::stage(format!(
            "Connecting to Ollama at {}",
            self.base_url
        )));

        let local_models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| classify_connection_error(e.to_string(), &self.base_url))?;

        if local_models.iter().any(|m| model_matches(&m.name, model_id)) {
            tracing::debug!(model = %model_id, "Model already available locally");
        } else {
            self.pull(model_id, &progress).await?;
        }

        progress(LoadProgress::bytes(format!("Model {} ready", model_id), 1, 1));

        Ok(Arc::new(OllamaEngine::new(
            self.client.clone(),
            model_id,
            self.base_url.clone(),
        )))
    }
}
